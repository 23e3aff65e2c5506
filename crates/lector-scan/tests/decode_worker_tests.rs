mod common;

use chrono::Utc;
use common::{FixedDecoder, PixelDecoder, gray_frame};
use lector_decode::{Decoder, Strategy, StrategySet, Symbol, Symbology};
use lector_scan::{
    DecodeSettings, DecodeStats, DecodeWorker, Frame, FrameOutcome, FrameSlot, ScanLog, Shutdown,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn worker(decoder: Arc<dyn Decoder>) -> (DecodeWorker, Arc<ScanLog>, Arc<FrameSlot>) {
    let slot = Arc::new(FrameSlot::new());
    let log = Arc::new(ScanLog::default());
    let worker = DecodeWorker::new(
        Arc::clone(&slot),
        Arc::clone(&log),
        decoder,
        StrategySet::default(),
        Arc::new(DecodeStats::new()),
        DecodeSettings::default(),
    );
    (worker, log, slot)
}

fn frame(sequence: u64, value: u8) -> Frame {
    Frame {
        sequence,
        image: gray_frame(value),
        captured_at: Utc::now(),
    }
}

#[test]
fn test_accept_suppress_accept() {
    let (mut worker, log, _) = worker(Arc::new(PixelDecoder));
    let t0 = Instant::now();

    let first = worker.process_frame(&frame(1, 70), t0);
    let second = worker.process_frame(&frame(2, 70), t0 + Duration::from_millis(500));
    let third = worker.process_frame(&frame(3, 70), t0 + Duration::from_millis(900));

    match first {
        FrameOutcome::Accepted(scan) => {
            assert_eq!(scan.id, 1);
            assert_eq!(scan.code, "CODE-70");
            assert_eq!(scan.symbology, Symbology::Code128);
        }
        other => panic!("expected accept, got {:?}", other),
    }
    assert_eq!(
        second,
        FrameOutcome::Suppressed {
            code: "CODE-70".to_string()
        }
    );
    assert!(matches!(third, FrameOutcome::Accepted(ref scan) if scan.id == 2));
    assert_eq!(log.latest_id(), 2);

    let stats = worker.stats().snapshot();
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(stats.detections_by_strategy["raw_color"], 3);
}

#[test]
fn test_interleaved_code_resets_debounce() {
    let (mut worker, log, _) = worker(Arc::new(PixelDecoder));
    let t0 = Instant::now();
    for (i, (value, ms)) in [(101u8, 0u64), (102, 100), (101, 200)].into_iter().enumerate() {
        let outcome = worker.process_frame(&frame(i as u64 + 1, value), t0 + Duration::from_millis(ms));
        assert!(matches!(outcome, FrameOutcome::Accepted(_)), "{:?}", outcome);
    }
    assert_eq!(log.latest_id(), 3);
}

#[test]
fn test_blank_frame_is_no_detection() {
    let (mut worker, log, _) = worker(Arc::new(PixelDecoder));
    assert_eq!(
        worker.process_frame(&frame(1, 0), Instant::now()),
        FrameOutcome::NoDetection
    );
    assert_eq!(log.latest_id(), 0);
    assert!(worker.stats().snapshot().detections_by_strategy.values().all(|&n| n == 0));
}

#[test]
fn test_blank_frame_runs_every_strategy() {
    struct Counting(AtomicUsize);
    impl Decoder for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn decode(&self, image: &lector_image::Image) -> Result<Vec<Symbol>, lector_decode::DecodeError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            PixelDecoder.decode(image)
        }
    }

    let decoder = Arc::new(Counting(AtomicUsize::new(0)));
    let (mut worker, log, _) = worker(Arc::clone(&decoder) as Arc<dyn Decoder>);
    assert_eq!(
        worker.process_frame(&frame(1, 0), Instant::now()),
        FrameOutcome::NoDetection
    );
    assert_eq!(decoder.0.load(Ordering::Relaxed), Strategy::ALL.len());
    assert!(log.is_empty());
    assert_eq!(worker.stats().snapshot().decode_faults, 0);
}

#[test]
fn test_one_scan_per_frame() {
    let decoder = FixedDecoder(vec![
        Symbol::new("A", Symbology::Ean13),
        Symbol::new("B", Symbology::Ean13),
    ]);
    let (mut worker, log, _) = worker(Arc::new(decoder));
    let t0 = Instant::now();

    assert!(matches!(
        worker.process_frame(&frame(1, 1), t0),
        FrameOutcome::Accepted(ref scan) if scan.code == "A"
    ));
    // A is debounced, so B from the same frame is taken instead
    assert!(matches!(
        worker.process_frame(&frame(2, 1), t0 + Duration::from_millis(10)),
        FrameOutcome::Accepted(ref scan) if scan.code == "B"
    ));
    assert_eq!(log.latest_id(), 2);
}

#[test]
fn test_faulting_decoder_never_stops_processing() {
    struct Exploding;
    impl Decoder for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        fn decode(&self, _: &lector_image::Image) -> Result<Vec<Symbol>, lector_decode::DecodeError> {
            panic!("corrupt frame")
        }
    }

    let (mut worker, _, _) = worker(Arc::new(Exploding));
    for i in 1..=3 {
        assert_eq!(
            worker.process_frame(&frame(i, 1), Instant::now()),
            FrameOutcome::NoDetection
        );
    }
    let stats = worker.stats().snapshot();
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.decode_faults, 15);
}

#[test]
fn test_run_skips_frames_and_stops_on_shutdown() {
    let (worker, log, slot) = worker(Arc::new(PixelDecoder));
    let stats = Arc::clone(worker.stats());
    let shutdown = Arc::new(Shutdown::new());
    let handle = {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || worker.run(shutdown))
    };

    // alternate codes so debounce never hides one; every other frame is processed
    for i in 0..8u8 {
        slot.publish(gray_frame(100 + i), Utc::now());
        let target = i as u64 + 1;
        assert!(common::wait_until(2000, || {
            let s = stats.snapshot();
            s.frames_processed + s.frames_skipped >= target
        }));
    }

    shutdown.trigger();
    handle.join().unwrap();

    let s = stats.snapshot();
    assert_eq!(s.frames_processed, 4);
    assert_eq!(s.frames_skipped, 4);
    assert_eq!(log.latest_id(), 4);
    // second, fourth, ... frame
    assert_eq!(log.find_after(0).unwrap().code, "CODE-101");
}
