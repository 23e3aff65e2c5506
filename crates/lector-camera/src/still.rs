use crate::{CameraError, FrameSource};
use lector_base::Vec2;
use lector_image::{Image, PixelFormat, decode_image};
use std::path::{Path, PathBuf};
use std::time::Duration;

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Frame source backed by image files.
///
/// `path` may be a single image or a directory of them (taken in file name
/// order). Each image is served for `hold_frames` consecutive captures
/// before moving on to the next, looping forever, the way a code held under
/// a real camera shows up in several frames in a row. Captures are paced to
/// the configured frame rate.
pub struct StillSource {
    path: PathBuf,
    hold_frames: usize,
    interval: Duration,
    images: Vec<Image>,
    position: usize,
}

impl StillSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hold_frames: 14,
            interval: Duration::from_millis(1000 / 14),
            images: Vec::new(),
            position: 0,
        }
    }

    /// Serve each image for `hold_frames` captures (at least 1).
    pub fn with_hold_frames(mut self, hold_frames: usize) -> Self {
        self.hold_frames = hold_frames.max(1);
        self
    }

    /// Pace captures to `fps`; 0 disables pacing.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.interval = match fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs_f64(1.0 / fps as f64),
        };
        self
    }

    fn image_paths(&self) -> Result<Vec<PathBuf>, CameraError> {
        if !self.path.is_dir() {
            return Ok(vec![self.path.clone()]);
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| has_image_extension(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for StillSource {
    fn name(&self) -> &str {
        "still"
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        let mut images = Vec::new();
        for path in self.image_paths()? {
            let bytes = std::fs::read(&path).map_err(|e| {
                CameraError::Device(format!("cannot read {}: {e}", path.display()))
            })?;
            images.push(decode_image(&bytes)?);
        }
        let first = images.first().ok_or_else(|| {
            CameraError::Device(format!("no images found at {}", self.path.display()))
        })?;
        let size = first.size;
        log::info!(
            "still: serving {} image(s) from {}",
            images.len(),
            self.path.display()
        );
        self.images = images;
        self.position = 0;
        Ok(size)
    }

    fn close(&mut self) {
        self.images.clear();
    }

    fn blocking_capture(&mut self, mut buffer: Vec<u8>) -> Result<Image, CameraError> {
        if self.images.is_empty() {
            return Err(CameraError::Stream("Source not open".to_string()));
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        let index = (self.position / self.hold_frames) % self.images.len();
        self.position = self.position.wrapping_add(1);

        let image = &self.images[index];
        buffer.clear();
        buffer.extend_from_slice(&image.data);
        Ok(Image::new(image.size, buffer, PixelFormat::Rgb8)?)
    }
}
