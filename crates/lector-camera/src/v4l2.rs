use crate::{CameraConfig, CameraError, FrameSource, RawFormat, raw_to_rgb};
use lector_base::Vec2;
use lector_image::Image;
use v4l::{
    Device, Format, FourCC, buffer::Type, io::mmap::Stream as MmapStream,
    io::traits::CaptureStream, video::Capture,
};

/// Camera backend for V4L2 devices (USB webcams, the Pi camera through the
/// legacy V4L2 bridge).
///
/// YUYV is requested first because it converts into recycled buffers; MJPEG
/// is accepted when the device insists on it.
pub struct V4l2Source {
    config: CameraConfig,
    stream: Option<MmapStream<'static>>,
    format: RawFormat,
    size: Vec2<usize>,
    stride: usize,
}

impl V4l2Source {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            stream: None,
            format: RawFormat::Yuyv,
            size: Vec2::new(0, 0),
            stride: 0,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        // close stream
        self.stream.take();

        let device = Device::with_path(self.config.device())?;

        // set the format and get the actual format back
        let actual_format = Capture::set_format(
            &device,
            &Format::new(self.config.width(), self.config.height(), FourCC::new(b"YUYV")),
        )?;

        self.format = match &actual_format.fourcc.repr {
            b"YUYV" => RawFormat::Yuyv,
            b"MJPG" => RawFormat::Mjpeg,
            b"RGB3" => RawFormat::Rgb24,
            b"BGR3" => RawFormat::Bgr24,
            _ => {
                return Err(CameraError::Unsupported(format!(
                    "pixel format {}",
                    actual_format.fourcc
                )));
            }
        };
        self.size = Vec2::new(actual_format.width as usize, actual_format.height as usize);
        self.stride = actual_format.stride as usize;

        // set the frame rate, the device may round it
        let actual_params = Capture::set_params(
            &device,
            &v4l::video::capture::Parameters::with_fps(self.config.fps()),
        )?;
        log::info!(
            "v4l2: {} opened at {} {:?}, {}/{} s per frame",
            self.config.device(),
            self.size,
            self.format,
            actual_params.interval.numerator,
            actual_params.interval.denominator
        );

        // create the stream
        let stream =
            MmapStream::with_buffers(&device, Type::VideoCapture, self.config.buffer_count())
                .map_err(|e| CameraError::Stream(e.to_string()))?;
        self.stream = Some(stream);

        Ok(self.size)
    }

    fn close(&mut self) {
        self.stream.take();
    }

    fn blocking_capture(&mut self, buffer: Vec<u8>) -> Result<Image, CameraError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CameraError::Stream("No stream".to_string()))?;
        let (frame_data, metadata) =
            CaptureStream::next(stream).map_err(|e| CameraError::Stream(e.to_string()))?;
        let used = (metadata.bytesused as usize).min(frame_data.len());
        let data = if used > 0 { &frame_data[..used] } else { frame_data };
        raw_to_rgb(self.format, self.size, self.stride, data, buffer)
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.close();
    }
}
