use crate::{
    CaptureHealth, CaptureSettings, CaptureWorker, DecodeSettings, DecodeStats, DecodeWorker,
    FrameSlot, ScanError, ScanLog, Shutdown, DEFAULT_RETENTION,
};
use lector_camera::FrameSource;
use lector_decode::{Decoder, StrategySet};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the capture/decode pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    capture: CaptureSettings,
    decode: DecodeSettings,
    strategies: StrategySet,
    retention: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            decode: DecodeSettings::default(),
            strategies: StrategySet::default(),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl PipelineConfig {
    /// Set the capture rate. 0 is rejected at start.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.capture.interval = match fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs_f64(1.0 / fps as f64),
        };
        self
    }

    /// Set the wait after a failed capture.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.capture.retry_backoff = backoff;
        self
    }

    /// Set the consecutive failures that trigger a reopen.
    pub fn with_reopen_after(mut self, failures: u32) -> Self {
        self.capture.reopen_after = failures;
        self
    }

    /// Set the wait between (re)open attempts.
    pub fn with_reopen_wait(mut self, wait: Duration) -> Self {
        self.capture.reopen_wait = wait;
        self
    }

    /// Re-trigger autofocus every `frames` frames; 0 disables it.
    pub fn with_autofocus_every(mut self, frames: u64) -> Self {
        self.capture.autofocus_every = frames;
        self
    }

    /// Set the decode worker's poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.decode.poll_interval = interval;
        self
    }

    /// Process every Nth new frame.
    pub fn with_skip_frames(mut self, skip_frames: u32) -> Self {
        self.decode.skip_frames = skip_frames;
        self
    }

    /// Set the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.decode.debounce_window = window;
        self
    }

    /// Sample memory every `iterations` decode iterations; 0 disables it.
    pub fn with_memory_every(mut self, iterations: u64) -> Self {
        self.decode.memory_every = iterations;
        self
    }

    /// Set the strategies tried on each frame.
    pub fn with_strategies(mut self, strategies: StrategySet) -> Self {
        self.strategies = strategies;
        self
    }

    /// Set how many scans the log keeps.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    // Getters
    pub fn capture(&self) -> &CaptureSettings {
        &self.capture
    }

    pub fn decode(&self) -> &DecodeSettings {
        &self.decode
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    fn validate(&self) -> Result<(), ScanError> {
        if self.capture.interval.is_zero() {
            return Err(ScanError::Config("fps must be positive".to_string()));
        }
        if self.decode.skip_frames == 0 {
            return Err(ScanError::Config("skip_frames must be at least 1".to_string()));
        }
        if self.capture.reopen_after == 0 {
            return Err(ScanError::Config("reopen_after must be at least 1".to_string()));
        }
        if self.retention == 0 {
            return Err(ScanError::Config("retention must be at least 1".to_string()));
        }
        if self.strategies.strategies().is_empty() {
            return Err(ScanError::Config("no decode strategies".to_string()));
        }
        Ok(())
    }
}

/// Running capture and decode workers plus the state they share.
///
/// Dropping the pipeline stops both workers and waits for them; the camera
/// is released by the capture thread before it exits.
pub struct Pipeline {
    slot: Arc<FrameSlot>,
    log: Arc<ScanLog>,
    health: Arc<CaptureHealth>,
    stats: Arc<DecodeStats>,
    decoder: Arc<dyn Decoder>,
    strategies: StrategySet,
    shutdown: Arc<Shutdown>,
    capture_handle: Option<JoinHandle<()>>,
    decode_handle: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Start both workers on their own threads.
    pub fn start(
        source: Box<dyn FrameSource>,
        decoder: Arc<dyn Decoder>,
        config: PipelineConfig,
    ) -> Result<Self, ScanError> {
        config.validate()?;

        let slot = Arc::new(FrameSlot::new());
        let log = Arc::new(ScanLog::new(config.retention));
        let health = Arc::new(CaptureHealth::new());
        let stats = Arc::new(DecodeStats::new());
        let shutdown = Arc::new(Shutdown::new());

        let capture = CaptureWorker::new(
            source,
            Arc::clone(&slot),
            Arc::clone(&health),
            Arc::clone(&shutdown),
            config.capture.clone(),
        );
        let capture_handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || capture.run())?;

        let decode = DecodeWorker::new(
            Arc::clone(&slot),
            Arc::clone(&log),
            Arc::clone(&decoder),
            config.strategies.clone(),
            Arc::clone(&stats),
            config.decode.clone(),
        );
        let decode_shutdown = Arc::clone(&shutdown);
        let decode_handle = match thread::Builder::new()
            .name("decode".to_string())
            .spawn(move || decode.run(decode_shutdown))
        {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                let _ = capture_handle.join();
                return Err(e.into());
            }
        };

        Ok(Self {
            slot,
            log,
            health,
            stats,
            decoder,
            strategies: config.strategies,
            shutdown,
            capture_handle: Some(capture_handle),
            decode_handle: Some(decode_handle),
        })
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    pub fn log(&self) -> &Arc<ScanLog> {
        &self.log
    }

    pub fn health(&self) -> &Arc<CaptureHealth> {
        &self.health
    }

    pub fn stats(&self) -> &Arc<DecodeStats> {
        &self.stats
    }

    /// The decoder the worker uses, for diagnostics on the side.
    pub fn decoder(&self) -> &Arc<dyn Decoder> {
        &self.decoder
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_triggered()
    }

    /// Stop both workers and wait for them. Idempotent.
    pub fn shutdown(&mut self) {
        self.shutdown.trigger();
        for handle in [self.capture_handle.take(), self.decode_handle.take()]
            .into_iter()
            .flatten()
        {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                log::error!("pipeline: {} thread panicked", name);
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
