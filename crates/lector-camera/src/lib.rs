//! Frame sources for the lector pipeline.
//!
//! A [`FrameSource`] is a blocking, single-owner handle on a camera (or a
//! stand-in for one). The capture worker drives it from its own thread:
//! `open`, then `blocking_capture` in a loop, `close` on shutdown or before
//! a reconnect.

pub mod config;
pub mod convert;
pub mod error;
pub mod still;
pub mod traits;

#[cfg(feature = "v4l2")]
pub mod v4l2;

#[cfg(feature = "rpicam")]
pub mod rpicam;

pub use config::CameraConfig;
pub use convert::{RawFormat, raw_to_rgb};
pub use error::CameraError;
pub use still::StillSource;
pub use traits::FrameSource;

#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;

#[cfg(feature = "rpicam")]
pub use rpicam::RpiCamSource;
