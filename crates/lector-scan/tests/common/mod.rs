#![allow(dead_code)]

use lector_base::Vec2;
use lector_camera::{CameraError, FrameSource};
use lector_decode::{DecodeError, Decoder, Symbol, Symbology};
use lector_image::{Image, PixelFormat};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const FRAME_SIZE: Vec2<usize> = Vec2 { x: 8, y: 4 };

/// One scripted capture result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Deliver a frame whose pixels all hold this value.
    Frame(u8),
    Fail,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub opens: usize,
    pub closes: usize,
    /// Every `close` call, including ones on an already closed source.
    pub close_calls: usize,
    pub open_failures_left: usize,
    pub is_open: bool,
    pub captures: usize,
    pub autofocus_triggers: usize,
    pub script: VecDeque<Step>,
    pub fallback: Option<u8>,
}

/// Frame source driven by a script, inspectable from the test thread.
pub struct MockSource {
    pub state: Arc<Mutex<MockState>>,
    pub autofocus: bool,
}

impl MockSource {
    pub fn new(script: Vec<Step>, fallback: Option<u8>) -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState {
            script: script.into(),
            fallback,
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
                autofocus: false,
            },
            state,
        )
    }
}

impl FrameSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        if state.open_failures_left > 0 {
            state.open_failures_left -= 1;
            return Err(CameraError::Device("no such camera".to_string()));
        }
        state.is_open = true;
        Ok(FRAME_SIZE)
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.close_calls += 1;
        if state.is_open {
            state.closes += 1;
        }
        state.is_open = false;
    }

    fn blocking_capture(&mut self, mut buffer: Vec<u8>) -> Result<Image, CameraError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.captures += 1;
            if !state.is_open {
                return Err(CameraError::Stream("not open".to_string()));
            }
            match state.script.pop_front() {
                Some(step) => step,
                None => match state.fallback {
                    Some(value) => Step::Frame(value),
                    None => Step::Fail,
                },
            }
        };
        std::thread::sleep(std::time::Duration::from_millis(1));
        match step {
            Step::Frame(value) => {
                buffer.clear();
                buffer.resize(FRAME_SIZE.x * FRAME_SIZE.y * 3, value);
                Ok(Image::new(FRAME_SIZE, buffer, PixelFormat::Rgb8).unwrap())
            }
            Step::Fail => Err(CameraError::Stream("sensor timeout".to_string())),
        }
    }

    fn supports_autofocus(&self) -> bool {
        self.autofocus
    }

    fn trigger_autofocus(&mut self) -> Result<(), CameraError> {
        self.state.lock().unwrap().autofocus_triggers += 1;
        Ok(())
    }
}

/// Below this first-pixel value a frame holds no code. Every filter maps a
/// black frame under it (contrast stretch lifts 0 to 30).
pub const BLANK_BELOW: u8 = 64;

/// Decoder that reads a code from the first pixel: values under
/// [`BLANK_BELOW`] mean nothing there, any other value `v` decodes as
/// `"CODE-v"`.
pub struct PixelDecoder;

impl Decoder for PixelDecoder {
    fn name(&self) -> &str {
        "pixel"
    }

    fn decode(&self, image: &Image) -> Result<Vec<Symbol>, DecodeError> {
        match image.data.first() {
            Some(&value) if value >= BLANK_BELOW => {
                Ok(vec![Symbol::new(format!("CODE-{value}"), Symbology::Code128)])
            }
            _ => Ok(vec![]),
        }
    }
}

/// Decoder returning a fixed list of symbols for every image.
pub struct FixedDecoder(pub Vec<Symbol>);

impl Decoder for FixedDecoder {
    fn name(&self) -> &str {
        "fixed"
    }

    fn decode(&self, _image: &Image) -> Result<Vec<Symbol>, DecodeError> {
        Ok(self.0.clone())
    }
}

pub fn gray_frame(value: u8) -> Image {
    Image::new(FRAME_SIZE, vec![value; FRAME_SIZE.x * FRAME_SIZE.y * 3], PixelFormat::Rgb8).unwrap()
}

/// Poll `condition` every few milliseconds for up to `timeout_ms`.
pub fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    condition()
}
