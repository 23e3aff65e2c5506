//! Preprocessing filters applied before a decode attempt.
//!
//! All filters operate on grayscale images and return a new image; the
//! input is never modified, since frames are shared between readers.

use crate::{Image, ImageError, PixelFormat};
use lector_base::Vec2;

/// Linear contrast stretch: `saturate(|alpha * v + beta|)` per pixel.
pub fn adjust_contrast(gray: &Image, alpha: f32, beta: f32) -> Result<Image, ImageError> {
    gray.format.ensure_format(PixelFormat::Gray8)?;
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| (alpha * v as f32 + beta).abs().round().clamp(0.0, 255.0) as u8)
        .collect();
    let data = gray.data.iter().map(|&v| lut[v as usize]).collect();
    Image::new(gray.size, data, PixelFormat::Gray8)
}

// reflect-101 border: -1 -> 1, n -> n - 2
fn reflect(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let i = if i < 0 { -i } else { i };
    let i = if i >= n { 2 * n - 2 - i } else { i };
    i.clamp(0, n - 1) as usize
}

/// 3x3 sharpening kernel: centre 9, all eight neighbours -1.
pub fn sharpen(gray: &Image) -> Result<Image, ImageError> {
    gray.format.ensure_format(PixelFormat::Gray8)?;
    let (width, height) = (gray.width(), gray.height());
    let mut data = vec![0u8; gray.data.len()];

    for y in 0..height {
        for x in 0..width {
            let mut acc: i32 = 0;
            for dy in -1isize..=1 {
                let row = reflect(y as isize + dy, height) * width;
                for dx in -1isize..=1 {
                    let v = gray.data[row + reflect(x as isize + dx, width)] as i32;
                    acc += if dx == 0 && dy == 0 { 9 * v } else { -v };
                }
            }
            data[y * width + x] = acc.clamp(0, 255) as u8;
        }
    }

    Image::new(gray.size, data, PixelFormat::Gray8)
}

/// Otsu's binarization. Returns the chosen threshold and the binary image
/// (pixels strictly above the threshold become 255, the rest 0).
pub fn otsu_threshold(gray: &Image) -> Result<(u8, Image), ImageError> {
    gray.format.ensure_format(PixelFormat::Gray8)?;

    let mut histogram = [0u64; 256];
    for &v in &gray.data {
        histogram[v as usize] += 1;
    }

    let total = gray.data.len() as f64;
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &count)| v as f64 * count as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = -1.0f64;
    let mut weight_bg = 0.0f64;
    let mut sum_bg = 0.0f64;

    for (t, &count) in histogram.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    // single-valued image: no split exists, everything is background
    if best_variance < 0.0 {
        best_threshold = gray.data.iter().copied().max().unwrap_or(0);
    }

    let data = gray
        .data
        .iter()
        .map(|&v| if v > best_threshold { 255 } else { 0 })
        .collect();
    Ok((best_threshold, Image::new(gray.size, data, PixelFormat::Gray8)?))
}

/// Resample to `size` with a triangle filter.
pub fn resize(image: &Image, size: Vec2<usize>) -> Result<Image, ImageError> {
    if image.size == size {
        return Ok(image.clone());
    }
    let (w, h) = (image.width() as u32, image.height() as u32);
    let (nw, nh) = (size.x as u32, size.y as u32);
    let filter = crates_image::imageops::FilterType::Triangle;
    let data = match image.format {
        PixelFormat::Rgb8 => {
            let buffer = crates_image::RgbImage::from_raw(w, h, image.data.clone())
                .ok_or_else(|| ImageError::Format("RGB buffer too small".to_string()))?;
            crates_image::imageops::resize(&buffer, nw, nh, filter).into_raw()
        }
        PixelFormat::Gray8 => {
            let buffer = crates_image::GrayImage::from_raw(w, h, image.data.clone())
                .ok_or_else(|| ImageError::Format("gray buffer too small".to_string()))?;
            crates_image::imageops::resize(&buffer, nw, nh, filter).into_raw()
        }
    };
    Image::new(size, data, image.format)
}
