#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed `[R, G, B]`, 3 bytes per pixel.
    Rgb8,
    /// One luma byte per pixel.
    Gray8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    pub fn ensure_format(&self, expected: PixelFormat) -> Result<(), crate::ImageError> {
        if *self != expected {
            return Err(crate::ImageError::Format(format!(
                "expected {:?} format, got {:?}",
                expected, self
            )));
        }
        Ok(())
    }
}
