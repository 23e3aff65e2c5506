//! Image buffers and pixel operations for the lector pipeline.
//!
//! Frames travel through the pipeline as [`Image`]: a packed, row-major
//! 8-bit buffer in either RGB or grayscale layout. This crate also holds the
//! preprocessing filters the decode strategies are built from, and a thin
//! JPEG layer over the `image` crate for debug output and previews.

pub mod convert;
pub mod error;
pub mod filter;
pub mod image;
pub mod jpeg;
pub mod pixelformat;

pub use convert::{rgb_to_gray, to_gray, yuyv_to_rgb_into};
pub use error::ImageError;
pub use filter::{adjust_contrast, otsu_threshold, resize, sharpen};
pub use image::Image;
pub use jpeg::{decode_image, encode_jpeg, save_jpeg};
pub use pixelformat::PixelFormat;
