use crate::{CameraConfig, CameraError, FrameSource, RawFormat, raw_to_rgb};
use lector_base::Vec2;
use lector_image::Image;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// libcamera fourcc codes in preference order, with their memory layout
const CANDIDATE_FORMATS: &[(&[u8; 4], RawFormat)] = &[
    (b"RG24", RawFormat::Bgr24),
    (b"BG24", RawFormat::Rgb24),
    (b"YUYV", RawFormat::Yuyv),
    (b"MJPG", RawFormat::Mjpeg),
];

// how long open() waits for the capture thread to bring the camera up
const INIT_TIMEOUT_MS: u64 = 5000;

// how long blocking_capture() waits for a frame
const CAPTURE_TIMEOUT_MS: u64 = 1000;

/// Stream parameters reported by the capture thread once the camera runs.
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    format: RawFormat,
    size: Vec2<usize>,
    stride: usize,
    autofocus: bool,
}

/// Channels between the source and its capture thread.
struct Link {
    frames: mpsc::Receiver<Vec<u8>>,
    spares: mpsc::Sender<Vec<u8>>,
    autofocus: mpsc::Sender<()>,
    thread_handle: JoinHandle<()>,
}

/// Raspberry Pi camera backend using libcamera.
///
/// libcamera objects borrow from their camera manager, so the whole camera
/// lives on a dedicated thread for as long as the source is open. Raw frames
/// come back over a bounded channel (dropped when the consumer lags) and
/// their buffers go back to the thread for the next copy.
///
/// **Note:** `config.device()` is ignored; cameras are picked by
/// `config.index()`.
pub struct RpiCamSource {
    config: CameraConfig,
    negotiated: Option<Negotiated>,
    link: Option<Link>,
}

impl RpiCamSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            negotiated: None,
            link: None,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Background thread: owns the camera from acquisition to release.
    fn capture_loop(
        config: CameraConfig,
        init_tx: mpsc::SyncSender<Result<Negotiated, CameraError>>,
        frame_tx: mpsc::SyncSender<Vec<u8>>,
        spare_rx: mpsc::Receiver<Vec<u8>>,
        autofocus_rx: mpsc::Receiver<()>,
    ) {
        use libcamera::{
            camera_manager::CameraManager,
            control::ControlList,
            controls::{AfMode, AfTrigger},
            framebuffer::AsFrameBuffer,
            framebuffer_allocator::{FrameBuffer, FrameBufferAllocator},
            framebuffer_map::MemoryMappedFrameBuffer,
            pixel_format::PixelFormat,
            request::ReuseFlag,
            stream::StreamRole,
        };

        let fail = |msg: String| {
            let _ = init_tx.send(Err(CameraError::Device(msg)));
        };

        let mgr = match CameraManager::new() {
            Ok(m) => m,
            Err(e) => return fail(e.to_string()),
        };
        let cameras = mgr.cameras();
        let Some(cam) = cameras.get(config.index()) else {
            return fail(format!("No camera at index {}", config.index()));
        };
        let mut cam = match cam.acquire() {
            Ok(c) => c,
            Err(e) => return fail(e.to_string()),
        };

        let Some(mut cfgs) = cam.generate_configuration(&[StreamRole::VideoRecording]) else {
            return fail("Failed to generate configuration".to_string());
        };

        // first candidate the pipeline accepts unchanged wins
        let mut chosen = None;
        for (fourcc, raw_format) in CANDIDATE_FORMATS {
            let pixel_format = PixelFormat::new(u32::from_le_bytes(**fourcc), 0);
            let Some(stream_cfg) = cfgs.get_mut(0) else {
                return fail("No stream configuration available".to_string());
            };
            stream_cfg.set_pixel_format(pixel_format);
            stream_cfg.set_size(config.width(), config.height());
            let status = cfgs.validate();
            let accepted = cfgs
                .get(0)
                .map(|cfg| cfg.get_pixel_format() == pixel_format)
                .unwrap_or(false);
            if accepted && !status.is_invalid() {
                chosen = Some(*raw_format);
                break;
            }
        }
        let Some(format) = chosen else {
            return fail("no supported pixel format".to_string());
        };

        if let Err(e) = cam.configure(&mut cfgs) {
            return fail(e.to_string());
        }

        let Some(stream_cfg) = cfgs.get(0) else {
            return fail("No stream configuration".to_string());
        };
        let actual_size = stream_cfg.get_size();
        let size = Vec2::new(actual_size.width as usize, actual_size.height as usize);
        let stride = stream_cfg.get_stride() as usize;
        let Some(stream) = stream_cfg.stream() else {
            return fail("No stream in configuration".to_string());
        };

        // allocate and map frame buffers
        let mut alloc = FrameBufferAllocator::new(&cam);
        let buffers = match alloc.alloc(&stream) {
            Ok(b) => b,
            Err(e) => return fail(e.to_string()),
        };
        let buffers = match buffers
            .into_iter()
            .map(MemoryMappedFrameBuffer::new)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(b) => b,
            Err(e) => return fail(e.to_string()),
        };

        let mut reqs = Vec::with_capacity(buffers.len());
        for buf in buffers {
            let mut req = match cam.create_request(None) {
                Ok(r) => r,
                Err(e) => return fail(format!("Failed to create request: {e}")),
            };
            if let Err(e) = req.add_buffer(&stream, buf) {
                return fail(format!("Failed to add buffer: {e}"));
            }
            reqs.push(req);
        }

        let (callback_tx, callback_rx) = mpsc::channel();
        cam.on_request_completed(move |req| {
            let _ = callback_tx.send(req);
        });

        // continuous autofocus where the sensor has a lens motor, auto mode otherwise
        let mut autofocus = false;
        if config.autofocus() {
            for mode in [AfMode::Continuous, AfMode::Auto] {
                let mut controls = ControlList::new();
                if controls.set(mode).is_ok() && cam.start(Some(&controls)).is_ok() {
                    autofocus = true;
                    break;
                }
            }
            if !autofocus {
                log::warn!("rpicam: autofocus unavailable, starting without it");
            }
        }
        if !autofocus {
            if let Err(e) = cam.start(None) {
                return fail(e.to_string());
            }
        }

        for req in &mut reqs {
            if let Err((_, e)) = cam.queue_request(req) {
                return fail(e.to_string());
            }
        }

        let _ = init_tx.send(Ok(Negotiated {
            format,
            size,
            stride,
            autofocus,
        }));

        // one-shot cycle right after start
        let mut pending_trigger = autofocus;
        loop {
            // the source dropping its sender is the stop signal
            match autofocus_rx.try_recv() {
                Ok(()) => pending_trigger = autofocus,
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => break,
            }

            let mut req = match callback_rx.recv_timeout(Duration::from_millis(CAPTURE_TIMEOUT_MS)) {
                Ok(r) => r,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };

            // copy out before the request is reused
            let frame = req
                .buffer::<MemoryMappedFrameBuffer<FrameBuffer>>(&stream)
                .and_then(|fb| {
                    let bytes_used = fb.metadata()?.planes().first()?.bytes_used as usize;
                    let planes = fb.data();
                    let plane = planes.first()?;
                    let mut data = spare_rx.try_recv().unwrap_or_default();
                    data.clear();
                    data.extend_from_slice(&plane[..bytes_used.min(plane.len())]);
                    Some(data)
                });

            match frame {
                Some(data) => match frame_tx.try_send(data) {
                    Ok(()) | Err(mpsc::TrySendError::Full(_)) => {}
                    Err(mpsc::TrySendError::Disconnected(_)) => break,
                },
                None => log::warn!("rpicam: completed request without frame data"),
            }

            req.reuse(ReuseFlag::ReuseBuffers);
            if pending_trigger {
                match req.controls_mut().set(AfTrigger::Start) {
                    Ok(()) => log::debug!("rpicam: autofocus triggered"),
                    Err(e) => log::warn!("rpicam: autofocus trigger failed: {e}"),
                }
                pending_trigger = false;
            }
            if let Err((_, e)) = cam.queue_request(&mut req) {
                log::error!("rpicam: failed to re-queue request: {e}");
                break;
            }
        }

        let _ = cam.stop();
    }
}

impl FrameSource for RpiCamSource {
    fn name(&self) -> &str {
        "rpicam"
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        self.close();

        let (init_tx, init_rx) = mpsc::sync_channel(1);
        let (frame_tx, frame_rx) = mpsc::sync_channel(self.config.buffer_count() as usize);
        let (spare_tx, spare_rx) = mpsc::channel();
        let (autofocus_tx, autofocus_rx) = mpsc::channel();

        let config = self.config.clone();
        let thread_handle = thread::Builder::new()
            .name("rpicam".to_string())
            .spawn(move || Self::capture_loop(config, init_tx, frame_tx, spare_rx, autofocus_rx))?;

        let negotiated = match init_rx.recv_timeout(Duration::from_millis(INIT_TIMEOUT_MS)) {
            Ok(result) => result,
            Err(_) => Err(CameraError::Device(
                "Camera thread did not come up".to_string(),
            )),
        };
        let link = Link {
            frames: frame_rx,
            spares: spare_tx,
            autofocus: autofocus_tx,
            thread_handle,
        };
        let negotiated = match negotiated {
            Ok(negotiated) => negotiated,
            Err(e) => {
                Self::shut_down(link);
                return Err(e);
            }
        };

        log::info!(
            "rpicam: camera {} running at {} {:?} (stride {}, autofocus {})",
            self.config.index(),
            negotiated.size,
            negotiated.format,
            negotiated.stride,
            negotiated.autofocus
        );
        self.negotiated = Some(negotiated);
        self.link = Some(link);
        Ok(negotiated.size)
    }

    fn close(&mut self) {
        self.negotiated = None;
        if let Some(link) = self.link.take() {
            Self::shut_down(link);
        }
    }

    fn blocking_capture(&mut self, buffer: Vec<u8>) -> Result<Image, CameraError> {
        let (Some(link), Some(negotiated)) = (self.link.as_ref(), self.negotiated) else {
            return Err(CameraError::Stream("Camera not open".to_string()));
        };
        let raw = match link
            .frames
            .recv_timeout(Duration::from_millis(CAPTURE_TIMEOUT_MS))
        {
            Ok(raw) => raw,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(CameraError::Stream("Capture timeout".to_string()));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(CameraError::Stream("Camera thread terminated".to_string()));
            }
        };
        let image = raw_to_rgb(
            negotiated.format,
            negotiated.size,
            negotiated.stride,
            &raw,
            buffer,
        );
        let _ = link.spares.send(raw);
        image
    }

    fn supports_autofocus(&self) -> bool {
        self.negotiated.map(|n| n.autofocus).unwrap_or(false)
    }

    fn trigger_autofocus(&mut self) -> Result<(), CameraError> {
        if !self.supports_autofocus() {
            return Err(CameraError::Unsupported(
                "camera has no autofocus".to_string(),
            ));
        }
        match &self.link {
            Some(link) => link
                .autofocus
                .send(())
                .map_err(|_| CameraError::Stream("Camera thread terminated".to_string())),
            None => Err(CameraError::Stream("Camera not open".to_string())),
        }
    }
}

impl RpiCamSource {
    fn shut_down(link: Link) {
        let Link {
            frames,
            spares,
            autofocus,
            thread_handle,
        } = link;
        drop(autofocus);
        drop(frames);
        drop(spares);
        let _ = thread_handle.join();
    }
}

impl Drop for RpiCamSource {
    fn drop(&mut self) {
        self.close();
    }
}
