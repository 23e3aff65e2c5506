use crate::{ImageError, PixelFormat};
use lector_base::Vec2;

/// Packed row-major 8-bit image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub size: Vec2<usize>,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl Image {
    /// Wrap `data`, checking its length against `size` and `format`.
    pub fn new(size: Vec2<usize>, data: Vec<u8>, format: PixelFormat) -> Result<Self, ImageError> {
        let expected = expected_len(size, format)?;
        if data.len() != expected {
            return Err(ImageError::Shape {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { size, data, format })
    }

    /// All-black image of the given size.
    pub fn zeros(size: Vec2<usize>, format: PixelFormat) -> Result<Self, ImageError> {
        let len = expected_len(size, format)?;
        Ok(Self {
            size,
            data: vec![0; len],
            format,
        })
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// HWC shape, `[height, width, channels]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.size.y, self.size.x, self.channels()]
    }

    /// Give back the pixel buffer, for reuse by the next capture.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

pub(crate) fn expected_len(size: Vec2<usize>, format: PixelFormat) -> Result<usize, ImageError> {
    size.area()
        .and_then(|area| area.checked_mul(format.channels()))
        .ok_or_else(|| ImageError::Format(format!("image size {} overflows", size)))
}
