use crate::{Debounce, Frame, FrameSlot, MemorySampler, Scan, ScanLog, Shutdown};
use lector_decode::{Decoder, Strategy, StrategySet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// progress log cadence, in processed frames
const LOG_EVERY_PROCESSED: u64 = 50;

/// Timing settings for [`DecodeWorker`].
#[derive(Debug, Clone)]
pub struct DecodeSettings {
    /// Longest wait for a new frame before re-checking for shutdown.
    pub poll_interval: Duration,
    /// Process every Nth new frame.
    pub skip_frames: u32,
    pub debounce_window: Duration,
    /// Sample memory every this many loop iterations; 0 disables it.
    pub memory_every: u64,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            skip_frames: 2,
            debounce_window: crate::DEBOUNCE_WINDOW,
            memory_every: 500,
        }
    }
}

/// What happened to one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Accepted(Scan),
    /// Symbols were found, but all of them within the debounce window.
    Suppressed { code: String },
    NoDetection,
}

/// Counters of the decode worker, readable from any thread.
#[derive(Debug, Default)]
pub struct DecodeStats {
    iterations: AtomicU64,
    frames_processed: AtomicU64,
    frames_skipped: AtomicU64,
    accepted: AtomicU64,
    suppressed: AtomicU64,
    decode_faults: AtomicU64,
    detections: [AtomicU64; Strategy::ALL.len()],
}

/// Point-in-time copy of [`DecodeStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeStatsSnapshot {
    pub iterations: u64,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub accepted: u64,
    pub suppressed: u64,
    pub decode_faults: u64,
    pub detections_by_strategy: BTreeMap<&'static str, u64>,
}

impl DecodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn detection(&self, strategy: Strategy) -> &AtomicU64 {
        let index = Strategy::ALL
            .iter()
            .position(|s| *s == strategy)
            .unwrap_or(0);
        &self.detections[index]
    }

    pub fn snapshot(&self) -> DecodeStatsSnapshot {
        DecodeStatsSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            decode_faults: self.decode_faults.load(Ordering::Relaxed),
            detections_by_strategy: Strategy::ALL
                .iter()
                .map(|&s| (s.name(), self.detection(s).load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Drains the frame slot, decodes, debounces and appends to the scan log.
///
/// The debounce state lives here and nowhere else. A failing or panicking
/// decoder only costs the frame it was looking at.
pub struct DecodeWorker {
    slot: Arc<FrameSlot>,
    log: Arc<ScanLog>,
    decoder: Arc<dyn Decoder>,
    strategies: StrategySet,
    debounce: Debounce,
    stats: Arc<DecodeStats>,
    settings: DecodeSettings,
}

impl DecodeWorker {
    pub fn new(
        slot: Arc<FrameSlot>,
        log: Arc<ScanLog>,
        decoder: Arc<dyn Decoder>,
        strategies: StrategySet,
        stats: Arc<DecodeStats>,
        settings: DecodeSettings,
    ) -> Self {
        Self {
            slot,
            log,
            decoder,
            strategies,
            debounce: Debounce::new(settings.debounce_window),
            stats,
            settings,
        }
    }

    pub fn stats(&self) -> &Arc<DecodeStats> {
        &self.stats
    }

    /// Decode one frame and apply debounce. At most one scan is accepted
    /// per frame: the first symbol that passes.
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> FrameOutcome {
        let processed = DecodeStats::bump(&self.stats.frames_processed);
        let outcome = self
            .strategies
            .decode_first(self.decoder.as_ref(), &frame.image);

        for (strategy, error) in &outcome.errors {
            DecodeStats::bump(&self.stats.decode_faults);
            log::debug!(
                "decode worker: {} failed on frame {}: {}",
                strategy,
                frame.sequence,
                error
            );
        }

        let Some(detection) = outcome.detection else {
            if processed % LOG_EVERY_PROCESSED == 0 {
                log::debug!("decode worker: processed {} frames", processed);
            }
            return FrameOutcome::NoDetection;
        };
        DecodeStats::bump(self.stats.detection(detection.strategy));
        log::debug!(
            "decode worker: {} symbol(s) on frame {} via {}",
            detection.symbols.len(),
            frame.sequence,
            detection.strategy
        );

        for symbol in &detection.symbols {
            if self.debounce.offer(&symbol.code, now) {
                let scan = self.log.append(symbol.code.clone(), symbol.symbology);
                DecodeStats::bump(&self.stats.accepted);
                log::info!(
                    "decode worker: scan #{}: {} ({})",
                    scan.id,
                    scan.code,
                    symbol.symbology
                );
                return FrameOutcome::Accepted(scan);
            }
        }

        DecodeStats::bump(&self.stats.suppressed);
        let code = detection.symbols[0].code.clone();
        log::trace!("decode worker: ignoring repeat of {}", code);
        FrameOutcome::Suppressed { code }
    }

    pub fn run(mut self, shutdown: Arc<Shutdown>) {
        log::info!(
            "decode worker: starting with {} decoder, every {} frame(s)",
            self.decoder.name(),
            self.settings.skip_frames
        );
        let mut memory = MemorySampler::new();
        let mut last_sequence = 0u64;
        let mut skip_counter = 0u32;

        while !shutdown.is_triggered() {
            let iteration = DecodeStats::bump(&self.stats.iterations);

            if let Some(frame) = self
                .slot
                .wait_newer(last_sequence, self.settings.poll_interval)
            {
                last_sequence = frame.sequence;
                skip_counter += 1;
                if skip_counter >= self.settings.skip_frames.max(1) {
                    skip_counter = 0;
                    self.process_frame(&frame, Instant::now());
                } else {
                    DecodeStats::bump(&self.stats.frames_skipped);
                }
            }

            if self.settings.memory_every > 0 && iteration % self.settings.memory_every == 0 {
                match memory.sample() {
                    Some(usage) => log::info!(
                        "decode worker: memory rss {:.1} MB ({:.2}%)",
                        usage.rss_mb,
                        usage.percent
                    ),
                    None => log::warn!("decode worker: memory sample unavailable"),
                }
            }
        }

        log::info!("decode worker: stopped");
    }
}
