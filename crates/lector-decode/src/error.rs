use std::fmt;

#[derive(Debug)]
pub enum DecodeError {
    /// Preprocessing failed before the decoder ran.
    Image(lector_image::ImageError),
    /// The decoder backend reported a failure.
    Backend(String),
    /// The decoder panicked on this image.
    Panic(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Image(err) => write!(f, "image error: {err}"),
            DecodeError::Backend(msg) => write!(f, "decoder error: {msg}"),
            DecodeError::Panic(msg) => write!(f, "decoder panicked: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<lector_image::ImageError> for DecodeError {
    fn from(err: lector_image::ImageError) -> Self {
        DecodeError::Image(err)
    }
}
