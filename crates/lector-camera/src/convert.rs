use crate::CameraError;
use lector_base::Vec2;
use lector_image::{Image, PixelFormat, yuyv_to_rgb_into};
use std::borrow::Cow;

/// Raw pixel layouts the camera backends can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    /// Packed 24-bit, blue first in memory (libcamera's RGB888).
    Bgr24,
    /// Packed 24-bit, red first in memory.
    Rgb24,
    Yuyv,
    Mjpeg,
}

// drop per-row padding so rows are packed back to back
fn unpad_rows(
    size: Vec2<usize>,
    bytes_per_pixel: usize,
    stride: usize,
    data: &[u8],
) -> Result<Cow<'_, [u8]>, CameraError> {
    let row = size.x * bytes_per_pixel;
    if stride == 0 || stride == row {
        return Ok(Cow::Borrowed(data));
    }
    if stride < row {
        return Err(CameraError::Stream(format!(
            "stride {stride} shorter than row of {row} bytes"
        )));
    }
    let needed = stride * size.y.saturating_sub(1) + row;
    if data.len() < needed {
        return Err(CameraError::Stream(format!(
            "frame too short: {} bytes, need {needed}",
            data.len()
        )));
    }
    let mut packed = Vec::with_capacity(row * size.y);
    for y in 0..size.y {
        packed.extend_from_slice(&data[y * stride..y * stride + row]);
    }
    Ok(Cow::Owned(packed))
}

fn packed_prefix(packed: &[u8], expected: usize) -> Result<&[u8], CameraError> {
    packed.get(..expected).ok_or_else(|| {
        CameraError::Stream(format!(
            "frame too short: {} bytes, need {expected}",
            packed.len()
        ))
    })
}

/// Convert one raw frame into an RGB [`Image`], filling `buffer`.
///
/// `stride` is the distance between rows in bytes; 0 means tightly packed.
/// MJPEG frames are decoded by the `image` crate and do not reuse `buffer`.
pub fn raw_to_rgb(
    format: RawFormat,
    size: Vec2<usize>,
    stride: usize,
    data: &[u8],
    mut buffer: Vec<u8>,
) -> Result<Image, CameraError> {
    match format {
        RawFormat::Mjpeg => {
            let image = lector_image::decode_image(data)?;
            if image.size != size {
                log::debug!("MJPEG frame is {}, negotiated {}", image.size, size);
            }
            return Ok(image);
        }
        RawFormat::Yuyv => {
            let packed = unpad_rows(size, 2, stride, data)?;
            yuyv_to_rgb_into(size, &packed, &mut buffer)?;
        }
        RawFormat::Rgb24 => {
            let packed = unpad_rows(size, 3, stride, data)?;
            let rgb = packed_prefix(&packed, size.x * size.y * 3)?;
            buffer.clear();
            buffer.extend_from_slice(rgb);
        }
        RawFormat::Bgr24 => {
            let packed = unpad_rows(size, 3, stride, data)?;
            let bgr = packed_prefix(&packed, size.x * size.y * 3)?;
            buffer.clear();
            buffer.reserve(bgr.len());
            for px in bgr.chunks_exact(3) {
                buffer.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
    }

    Ok(Image::new(size, buffer, PixelFormat::Rgb8)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_is_swapped() {
        let data = [1, 2, 3, 4, 5, 6];
        let image = raw_to_rgb(RawFormat::Bgr24, Vec2::new(2, 1), 0, &data, Vec::new()).unwrap();
        assert_eq!(image.data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_stride_padding_removed() {
        // 1x2 RGB with 2 bytes of padding per row
        let data = [10, 20, 30, 0, 0, 40, 50, 60, 0, 0];
        let image = raw_to_rgb(RawFormat::Rgb24, Vec2::new(1, 2), 5, &data, Vec::new()).unwrap();
        assert_eq!(image.data, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_recycled_buffer_is_reused() {
        let buffer = Vec::with_capacity(1024);
        let ptr = buffer.as_ptr();
        let data = [0u8; 12];
        let image = raw_to_rgb(RawFormat::Rgb24, Vec2::new(2, 2), 0, &data, buffer).unwrap();
        assert_eq!(image.data.as_ptr(), ptr);
    }

    #[test]
    fn test_short_frame_rejected() {
        let data = [0u8; 5];
        let result = raw_to_rgb(RawFormat::Yuyv, Vec2::new(2, 2), 0, &data, Vec::new());
        assert!(result.is_err());
    }
}
