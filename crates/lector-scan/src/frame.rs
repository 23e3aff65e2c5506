use chrono::{DateTime, Utc};
use lector_image::Image;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// One captured image.
#[derive(Debug)]
pub struct Frame {
    pub sequence: u64,
    pub image: Image,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SlotState {
    frame: Option<Arc<Frame>>,
    sequence: u64,
}

/// Single-item, overwrite-always holder for the newest frame.
///
/// Frames are shared as `Arc<Frame>`: a reader keeps its snapshot alive for
/// as long as it needs it, and the lock is only held for the pointer swap.
/// Sequence numbers are assigned here, so they keep increasing across camera
/// reconnects.
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` as the newest frame and wake waiters.
    ///
    /// Returns the sequence number given to the new frame and the frame it
    /// replaced, so the caller can reclaim its buffer if nobody else holds it.
    pub fn publish(&self, image: Image, captured_at: DateTime<Utc>) -> (u64, Option<Arc<Frame>>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sequence += 1;
        let frame = Arc::new(Frame {
            sequence: state.sequence,
            image,
            captured_at,
        });
        let evicted = state.frame.replace(frame);
        let sequence = state.sequence;
        drop(state);
        self.cond.notify_all();
        (sequence, evicted)
    }

    /// The newest frame, if any was published.
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .frame
            .clone()
    }

    /// Sequence number of the newest frame (0 before the first publish).
    pub fn sequence(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).sequence
    }

    /// Wait up to `timeout` for a frame newer than `after`.
    pub fn wait_newer(&self, after: u64, timeout: Duration) -> Option<Arc<Frame>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if state.sequence > after {
                return state.frame.clone();
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = match self.cond.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
    }
}
