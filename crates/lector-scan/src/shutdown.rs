use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Process-wide stop signal for the worker threads.
///
/// Workers sleep through [`Shutdown::sleep`] instead of `thread::sleep`, so a
/// trigger wakes them immediately even in the middle of a backoff.
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    cond: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock().unwrap_or_else(|e| e.into_inner());
        *triggered = true;
        self.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `duration` or until triggered. Returns `true` if triggered.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut triggered = self.triggered.lock().unwrap_or_else(|e| e.into_inner());
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            triggered = match self.cond.wait_timeout(triggered, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        *triggered
    }
}
