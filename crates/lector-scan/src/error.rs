use std::fmt;

#[derive(Debug)]
pub enum ScanError {
    /// A worker thread could not be started.
    Spawn(std::io::Error),
    Camera(lector_camera::CameraError),
    Config(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Spawn(err) => write!(f, "cannot start worker: {err}"),
            ScanError::Camera(err) => write!(f, "camera error: {err}"),
            ScanError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Spawn(err)
    }
}

impl From<lector_camera::CameraError> for ScanError {
    fn from(err: lector_camera::CameraError) -> Self {
        ScanError::Camera(err)
    }
}
