use crate::{Image, ImageError, PixelFormat};
use crates_image::ImageEncoder;
use lector_base::Vec2;
use std::path::Path;

/// Decode any supported container (JPEG, PNG, BMP) into an RGB image.
pub fn decode_image(data: &[u8]) -> Result<Image, ImageError> {
    let decoded = crates_image::load_from_memory(data)?;
    let rgb = decoded.to_rgb8();
    let size = Vec2::from(rgb.dimensions());
    Image::new(size, rgb.into_raw(), PixelFormat::Rgb8)
}

/// Encodes an `Image` as JPEG bytes.
///
/// The `quality` parameter controls JPEG compression (1-100, higher = better quality).
pub fn encode_jpeg(image: &Image, quality: u8) -> Result<Vec<u8>, ImageError> {
    let color_type = match image.format {
        PixelFormat::Rgb8 => crates_image::ExtendedColorType::Rgb8,
        PixelFormat::Gray8 => crates_image::ExtendedColorType::L8,
    };

    let mut buffer = Vec::new();
    let encoder = crates_image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            &image.data,
            image.width() as u32,
            image.height() as u32,
            color_type,
        )
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(buffer)
}

/// Encode `image` as JPEG and write it to `path`.
pub fn save_jpeg(image: &Image, path: impl AsRef<Path>, quality: u8) -> Result<(), ImageError> {
    let bytes = encode_jpeg(image, quality)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
