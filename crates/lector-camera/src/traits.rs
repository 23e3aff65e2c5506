use crate::CameraError;
use lector_base::Vec2;
use lector_image::Image;

/// Blocking camera capability.
///
/// Implementations are owned by exactly one thread at a time. `open` may be
/// called again after `close` (the capture worker reconnects that way), and
/// implementations must release the underlying device in `close` and on drop.
pub trait FrameSource: Send {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Acquire and start the device. Returns the negotiated frame size.
    fn open(&mut self) -> Result<Vec2<usize>, CameraError>;

    /// Stop and release the device, if open.
    fn close(&mut self);

    /// Capture one RGB frame.
    ///
    /// `buffer` is a recycled pixel buffer (possibly empty); implementations
    /// should fill it and hand it back inside the returned image instead of
    /// allocating a new one.
    fn blocking_capture(&mut self, buffer: Vec<u8>) -> Result<Image, CameraError>;

    fn supports_autofocus(&self) -> bool {
        false
    }

    /// Run one autofocus cycle.
    fn trigger_autofocus(&mut self) -> Result<(), CameraError> {
        Err(CameraError::Unsupported(format!(
            "{} has no autofocus control",
            self.name()
        )))
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn blocking_capture(&mut self, buffer: Vec<u8>) -> Result<Image, CameraError> {
        (**self).blocking_capture(buffer)
    }

    fn supports_autofocus(&self) -> bool {
        (**self).supports_autofocus()
    }

    fn trigger_autofocus(&mut self) -> Result<(), CameraError> {
        (**self).trigger_autofocus()
    }
}
