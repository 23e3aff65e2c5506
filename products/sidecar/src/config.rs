use crate::SidecarError;
use clap::{Parser, ValueEnum};
use lector_camera::{CameraConfig, FrameSource, StillSource};
use lector_scan::{DEBOUNCE_WINDOW, DEFAULT_AWAIT_TIMEOUT, DEFAULT_RETENTION, PipelineConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Which frame source backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// libcamera (Raspberry Pi camera modules)
    Rpicam,
    /// V4L2 device node
    V4l2,
    /// Images from disk, for bench testing without a camera
    Still,
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Barcode camera sidecar: captures frames, decodes barcodes and serves scans over HTTP")]
pub struct SidecarArgs {
    #[clap(long, env = "LECTOR_HOST", default_value = "127.0.0.1", help = "Address to listen on")]
    pub host: String,

    #[clap(long, env = "LECTOR_PORT", default_value_t = 7313, help = "Port to listen on")]
    pub port: u16,

    #[clap(long, value_enum, env = "LECTOR_SOURCE", default_value = "rpicam", help = "Frame source backend")]
    pub source: SourceKind,

    #[clap(long, env = "LECTOR_DEVICE", default_value = "/dev/video0", help = "V4L2 device path")]
    pub device: String,

    #[clap(long, env = "LECTOR_CAMERA_INDEX", default_value_t = 0, help = "libcamera camera index")]
    pub camera_index: usize,

    #[clap(long, env = "LECTOR_WIDTH", default_value_t = 1280, help = "Requested frame width")]
    pub width: u32,

    #[clap(long, env = "LECTOR_HEIGHT", default_value_t = 720, help = "Requested frame height")]
    pub height: u32,

    #[clap(long, env = "LECTOR_FPS", default_value_t = 14, help = "Target capture rate")]
    pub fps: u32,

    #[clap(long, env = "LECTOR_NO_AUTOFOCUS", help = "Leave autofocus alone")]
    pub no_autofocus: bool,

    #[clap(long, env = "LECTOR_STILL_PATH", help = "Image file or directory for --source still")]
    pub still_path: Option<PathBuf>,

    #[clap(long, env = "LECTOR_POLL_MS", default_value_t = 20, help = "Decode worker idle wait in milliseconds")]
    pub poll_ms: u64,

    #[clap(long, env = "LECTOR_SKIP_FRAMES", default_value_t = 2, help = "Decode one frame in every N")]
    pub skip_frames: u32,

    #[clap(long, env = "LECTOR_DEBOUNCE_MS", default_value_t = DEBOUNCE_WINDOW.as_millis() as u64, help = "Repeat suppression window in milliseconds")]
    pub debounce_ms: u64,

    #[clap(long, env = "LECTOR_NEXT_SCAN_TIMEOUT_MS", default_value_t = DEFAULT_AWAIT_TIMEOUT.as_millis() as u64, help = "Long-poll timeout of /next_scan in milliseconds")]
    pub next_scan_timeout_ms: u64,

    #[clap(long, env = "LECTOR_RETENTION", default_value_t = DEFAULT_RETENTION, help = "Number of scans kept in memory")]
    pub retention: usize,

    #[clap(long, env = "LECTOR_DEBUG_DIR", default_value = "/tmp", help = "Where /debug/frame writes its images")]
    pub debug_dir: PathBuf,

    #[clap(long, env = "LECTOR_LOG_DIR", help = "Write daily log files here instead of stdout")]
    pub log_dir: Option<PathBuf>,
}

/// Settings of the HTTP layer.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub next_scan_timeout: Duration,
    pub debug_dir: PathBuf,
    pub preview_fps: u32,
    pub preview_width: usize,
    pub preview_height: usize,
    pub preview_quality: u8,
    pub debug_quality: u8,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            next_scan_timeout: DEFAULT_AWAIT_TIMEOUT,
            debug_dir: std::env::temp_dir(),
            preview_fps: 6,
            preview_width: 640,
            preview_height: 360,
            preview_quality: 75,
            debug_quality: 90,
        }
    }
}

impl SidecarArgs {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig::default()
            .with_device(self.device.clone())
            .with_index(self.camera_index)
            .with_width(self.width)
            .with_height(self.height)
            .with_fps(self.fps)
            .with_autofocus(!self.no_autofocus)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_fps(self.fps)
            .with_poll_interval(Duration::from_millis(self.poll_ms))
            .with_skip_frames(self.skip_frames)
            .with_debounce_window(Duration::from_millis(self.debounce_ms))
            .with_retention(self.retention)
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            next_scan_timeout: Duration::from_millis(self.next_scan_timeout_ms),
            debug_dir: self.debug_dir.clone(),
            ..ServerSettings::default()
        }
    }

    /// Build the frame source selected by `--source`.
    pub fn build_source(&self) -> Result<Box<dyn FrameSource>, SidecarError> {
        match self.source {
            SourceKind::Still => {
                let path = self.still_path.clone().ok_or_else(|| {
                    SidecarError::Config("--source still needs --still-path".to_string())
                })?;
                Ok(Box::new(StillSource::new(path).with_fps(self.fps)))
            }
            SourceKind::V4l2 => build_v4l2(self.camera_config()),
            SourceKind::Rpicam => build_rpicam(self.camera_config()),
        }
    }
}

#[cfg(feature = "v4l2")]
fn build_v4l2(config: CameraConfig) -> Result<Box<dyn FrameSource>, SidecarError> {
    Ok(Box::new(lector_camera::V4l2Source::new(config)))
}

#[cfg(not(feature = "v4l2"))]
fn build_v4l2(_config: CameraConfig) -> Result<Box<dyn FrameSource>, SidecarError> {
    Err(SidecarError::Config(
        "built without V4L2 support (enable the v4l2 feature)".to_string(),
    ))
}

#[cfg(feature = "rpicam")]
fn build_rpicam(config: CameraConfig) -> Result<Box<dyn FrameSource>, SidecarError> {
    Ok(Box::new(lector_camera::RpiCamSource::new(config)))
}

#[cfg(not(feature = "rpicam"))]
fn build_rpicam(_config: CameraConfig) -> Result<Box<dyn FrameSource>, SidecarError> {
    Err(SidecarError::Config(
        "built without libcamera support (enable the rpicam feature)".to_string(),
    ))
}
