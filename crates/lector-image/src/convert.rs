use crate::image::expected_len;
use crate::{Image, ImageError, PixelFormat};
use lector_base::Vec2;
use std::borrow::Cow;

// BT.601 YUV-to-RGB conversion for a single pixel (fixed-point, shift 8)
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    let r = (y + ((359 * v) >> 8)).clamp(0, 255) as u8;
    let g = (y - ((88 * u + 183 * v) >> 8)).clamp(0, 255) as u8;
    let b = (y + ((454 * u) >> 8)).clamp(0, 255) as u8;
    [r, g, b]
}

/// Converts YUYV (YUV 4:2:2) pixel data to packed RGB, writing into `out`.
///
/// YUYV packs as `[Y0, U, Y1, V, ...]`: each pair of pixels shares U and V.
/// `out` is cleared first, so a buffer from a previous frame can be handed in
/// and its allocation reused.
///
/// # Errors
///
/// Returns `ImageError::Shape` if `data` is shorter than `width * height * 2`.
pub fn yuyv_to_rgb_into(size: Vec2<usize>, data: &[u8], out: &mut Vec<u8>) -> Result<(), ImageError> {
    let pixel_count = size
        .area()
        .ok_or_else(|| ImageError::Format(format!("image size {} overflows", size)))?;
    let expected = pixel_count * 2;
    if data.len() < expected {
        return Err(ImageError::Shape {
            expected,
            got: data.len(),
        });
    }

    out.clear();
    out.reserve(pixel_count * 3);
    for chunk in data[..expected].chunks_exact(4) {
        out.extend_from_slice(&yuv_to_rgb(chunk[0], chunk[1], chunk[3]));
        out.extend_from_slice(&yuv_to_rgb(chunk[2], chunk[1], chunk[3]));
    }
    Ok(())
}

// fixed-point BT.601 luma weights (shift 14), rounding
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;

/// Converts an RGB image to single-channel luma.
pub fn rgb_to_gray(image: &Image) -> Result<Image, ImageError> {
    image.format.ensure_format(PixelFormat::Rgb8)?;
    let mut gray = Vec::with_capacity(expected_len(image.size, PixelFormat::Gray8)?);
    for px in image.data.chunks_exact(3) {
        let luma = (px[0] as u32 * LUMA_R + px[1] as u32 * LUMA_G + px[2] as u32 * LUMA_B + (1 << 13)) >> 14;
        gray.push(luma.min(255) as u8);
    }
    Image::new(image.size, gray, PixelFormat::Gray8)
}

/// Borrow `image` if it already is grayscale, convert it otherwise.
pub fn to_gray(image: &Image) -> Result<Cow<'_, Image>, ImageError> {
    match image.format {
        PixelFormat::Gray8 => Ok(Cow::Borrowed(image)),
        PixelFormat::Rgb8 => Ok(Cow::Owned(rgb_to_gray(image)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_neutral_chroma_is_gray() {
        assert_eq!(yuv_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(200, 128, 128), [200, 200, 200]);
    }

    #[test]
    fn test_luma_weights_sum_to_one() {
        assert_eq!(LUMA_R + LUMA_G + LUMA_B, 1 << 14);
    }
}
