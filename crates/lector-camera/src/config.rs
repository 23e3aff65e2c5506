/// Configuration for camera capture.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    device: String,
    index: usize,
    width: u32,
    height: u32,
    fps: u32,
    buffer_count: u32,
    autofocus: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            index: 0,
            width: 1280,
            height: 720,
            fps: 14,
            buffer_count: 4,
            autofocus: true,
        }
    }
}

impl CameraConfig {
    /// Set the device path (e.g., "/dev/video0"). Used by V4L2.
    pub fn with_device(mut self, device: String) -> Self {
        self.device = device;
        self
    }

    /// Set the camera index. Used by libcamera, which has no device paths.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Set the capture width in pixels.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Set the capture height in pixels.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    /// Set the frames per second.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the buffer count for the capture stream.
    pub fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    /// Enable or disable continuous autofocus where the sensor has it.
    pub fn with_autofocus(mut self, autofocus: bool) -> Self {
        self.autofocus = autofocus;
        self
    }

    // Getters
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    pub fn autofocus(&self) -> bool {
        self.autofocus
    }
}
