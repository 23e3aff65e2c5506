use crate::{FrameSlot, Shutdown};
use chrono::{DateTime, Utc};
use lector_camera::FrameSource;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

// status reported until the first frame arrives
pub const NOT_INITIALIZED: &str = "Camera not initialized";

// log a capture line every this many frames
const LOG_EVERY_FRAMES: u64 = 50;

/// Timing and retry settings for [`CaptureWorker`].
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Target time between captures.
    pub interval: Duration,
    /// Wait after a failed capture before trying again.
    pub retry_backoff: Duration,
    /// Consecutive capture failures before the source is closed and reopened.
    pub reopen_after: u32,
    /// Wait between attempts to (re)open the source.
    pub reopen_wait: Duration,
    /// Re-trigger autofocus every this many frames; 0 disables it.
    pub autofocus_every: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000 / 14),
            retry_backoff: Duration::from_secs(1),
            reopen_after: 5,
            reopen_wait: Duration::from_secs(1),
            autofocus_every: 150,
        }
    }
}

#[derive(Debug, Default)]
struct HealthState {
    open: bool,
    last_error: Option<String>,
    last_capture: Option<DateTime<Utc>>,
}

/// Liveness of the capture side, shared with the request layer.
#[derive(Debug)]
pub struct CaptureHealth {
    state: Mutex<HealthState>,
    frames_captured: AtomicU64,
    buffers_allocated: AtomicU64,
    buffers_recycled: AtomicU64,
    autofocus_supported: AtomicBool,
    autofocus_requested: AtomicBool,
    // bumped on every recorded fault
    faults: watch::Sender<u64>,
}

impl Default for CaptureHealth {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            frames_captured: AtomicU64::new(0),
            buffers_allocated: AtomicU64::new(0),
            buffers_recycled: AtomicU64::new(0),
            autofocus_supported: AtomicBool::new(false),
            autofocus_requested: AtomicBool::new(false),
            faults: watch::channel(0).0,
        }
    }
}

impl CaptureHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receiver that sees every fault recorded after this call.
    pub fn subscribe_faults(&self) -> watch::Receiver<u64> {
        self.faults.subscribe()
    }

    /// Wait for the next fault seen by `faults` that is still current, and
    /// return its message.
    pub async fn next_fault(&self, faults: &mut watch::Receiver<u64>) -> String {
        loop {
            if faults.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
            if let Err(error) = self.status() {
                return error;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Ok` while capturing normally; the fault message otherwise.
    pub fn status(&self) -> Result<(), String> {
        let state = self.lock();
        if let Some(error) = &state.last_error {
            return Err(error.clone());
        }
        if state.last_capture.is_none() {
            return Err(NOT_INITIALIZED.to_string());
        }
        Ok(())
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Time of the last successful capture.
    pub fn last_capture(&self) -> Option<DateTime<Utc>> {
        self.lock().last_capture
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Captures that needed a fresh pixel buffer.
    pub fn buffers_allocated(&self) -> u64 {
        self.buffers_allocated.load(Ordering::Relaxed)
    }

    /// Captures that reused the buffer of an evicted frame.
    pub fn buffers_recycled(&self) -> u64 {
        self.buffers_recycled.load(Ordering::Relaxed)
    }

    /// Ask the capture thread to run an autofocus cycle.
    pub fn request_autofocus(&self) -> Result<(), String> {
        if !self.is_open() {
            return Err(NOT_INITIALIZED.to_string());
        }
        if !self.autofocus_supported.load(Ordering::Relaxed) {
            return Err("Autofocus not supported by this camera".to_string());
        }
        self.autofocus_requested.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn record_open(&self, autofocus_supported: bool) {
        self.autofocus_supported
            .store(autofocus_supported, Ordering::Relaxed);
        self.lock().open = true;
    }

    fn record_closed(&self) {
        self.autofocus_supported.store(false, Ordering::Relaxed);
        self.lock().open = false;
    }

    fn record_capture(&self, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.last_capture = Some(at);
        state.last_error = None;
        drop(state);
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, error: String) {
        self.lock().last_error = Some(error);
        self.faults.send_modify(|count| *count += 1);
    }

    fn take_autofocus_request(&self) -> bool {
        self.autofocus_requested.swap(false, Ordering::Relaxed)
    }
}

/// Frame source adapter: owns the camera and keeps the frame slot fresh.
///
/// Runs on its own thread until shutdown. Faults never end the loop; they
/// are recorded in [`CaptureHealth`], and the source is reopened after
/// repeated failures. The source is closed on this thread before `run`
/// returns.
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    slot: Arc<FrameSlot>,
    health: Arc<CaptureHealth>,
    shutdown: Arc<Shutdown>,
    settings: CaptureSettings,
    // buffer of the last evicted frame, reused by the next capture
    spare: Option<Vec<u8>>,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        slot: Arc<FrameSlot>,
        health: Arc<CaptureHealth>,
        shutdown: Arc<Shutdown>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            source,
            slot,
            health,
            shutdown,
            settings,
            spare: None,
        }
    }

    pub fn run(mut self) {
        log::info!("capture worker: starting with {} source", self.source.name());

        while !self.shutdown.is_triggered() {
            match self.source.open() {
                Ok(size) => {
                    log::info!("capture worker: {} open at {}", self.source.name(), size);
                    self.health.record_open(self.source.supports_autofocus());
                }
                Err(e) => {
                    log::error!("capture worker: cannot open {}: {}", self.source.name(), e);
                    self.health.record_error(format!("Fatal camera error: {e}"));
                    self.shutdown.sleep(self.settings.reopen_wait);
                    continue;
                }
            }

            // keep capturing until failures pile up
            let completed = self.capture_until_fault();

            log::info!("capture worker: closing {}", self.source.name());
            self.source.close();
            self.health.record_closed();
            if completed {
                break;
            }
            self.shutdown.sleep(self.settings.reopen_wait);
        }

        // the source is only ever open inside the loop body, which closes it
        log::info!("capture worker: stopped");
    }

    // returns true on shutdown, false when the source should be reopened
    fn capture_until_fault(&mut self) -> bool {
        let mut failures = 0u32;
        let mut frames_since_open = 0u64;

        loop {
            if self.shutdown.is_triggered() {
                return true;
            }
            let started = Instant::now();

            let buffer = match self.spare.take() {
                Some(buffer) => {
                    self.health.buffers_recycled.fetch_add(1, Ordering::Relaxed);
                    buffer
                }
                None => {
                    self.health.buffers_allocated.fetch_add(1, Ordering::Relaxed);
                    Vec::new()
                }
            };

            match self.source.blocking_capture(buffer) {
                Ok(image) => {
                    failures = 0;
                    frames_since_open += 1;
                    let captured_at = Utc::now();
                    let (sequence, evicted) = self.slot.publish(image, captured_at);
                    self.health.record_capture(captured_at);

                    // reclaim the old buffer unless a reader still holds the frame
                    if let Some(frame) = evicted.and_then(|frame| Arc::try_unwrap(frame).ok()) {
                        self.spare = Some(frame.image.into_data());
                    }

                    if sequence % LOG_EVERY_FRAMES == 0 {
                        log::debug!("capture worker: frame {}", sequence);
                    }

                    self.maybe_autofocus(frames_since_open);
                }
                Err(e) => {
                    failures += 1;
                    log::warn!(
                        "capture worker: capture failed ({}/{}): {}",
                        failures,
                        self.settings.reopen_after,
                        e
                    );
                    self.health
                        .record_error(format!("Camera capture error: {e}"));
                    if failures >= self.settings.reopen_after {
                        return false;
                    }
                    if self.shutdown.sleep(self.settings.retry_backoff) {
                        return true;
                    }
                    continue;
                }
            }

            // pace to the target interval
            let elapsed = started.elapsed();
            if elapsed < self.settings.interval
                && self.shutdown.sleep(self.settings.interval - elapsed)
            {
                return true;
            }
        }
    }

    fn maybe_autofocus(&mut self, frames_since_open: u64) {
        let requested = self.health.take_autofocus_request();
        let periodic = self.settings.autofocus_every > 0
            && frames_since_open % self.settings.autofocus_every == 0;
        if !(requested || periodic) || !self.source.supports_autofocus() {
            return;
        }
        match self.source.trigger_autofocus() {
            Ok(()) if requested => log::info!("capture worker: autofocus triggered on request"),
            Ok(()) => log::debug!("capture worker: periodic autofocus after {} frames", frames_since_open),
            Err(e) => log::warn!("capture worker: autofocus failed: {}", e),
        }
    }
}
