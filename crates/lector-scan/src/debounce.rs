use std::time::{Duration, Instant};

/// Default suppression window for repeated codes.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(800);

/// Collapses repeated detections of the same code into one scan.
///
/// Only the most recently accepted code is remembered: a code is rejected
/// when it equals that code and arrives less than `window` after it was
/// accepted. Anything else is accepted and becomes the new reference, so a
/// different code in between makes the first one eligible again at once.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Would `code` be accepted at `now`? Does not change state.
    pub fn check(&self, code: &str, now: Instant) -> bool {
        match &self.last {
            Some((last_code, accepted_at)) if last_code == code => {
                now.saturating_duration_since(*accepted_at) >= self.window
            }
            _ => true,
        }
    }

    /// Check `code` and, if accepted, remember it as the last accepted code.
    pub fn offer(&mut self, code: &str, now: Instant) -> bool {
        let accepted = self.check(code, now);
        if accepted {
            self.last = Some((code.to_string(), now));
        }
        accepted
    }

    pub fn last_code(&self) -> Option<&str> {
        self.last.as_ref().map(|(code, _)| code.as_str())
    }
}
