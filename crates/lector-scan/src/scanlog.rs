use chrono::{DateTime, Utc};
use lector_decode::Symbology;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Default number of scans kept in memory.
pub const DEFAULT_RETENTION: usize = 1024;

/// Default long-poll wait.
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(8);

fn symbology_name<S: Serializer>(symbology: &Symbology, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(symbology.name())
}

/// One accepted scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scan {
    pub id: u64,
    pub code: String,
    #[serde(serialize_with = "symbology_name")]
    pub symbology: Symbology,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`ScanLog::await_after`].
#[derive(Debug, Clone, PartialEq)]
pub enum AwaitOutcome {
    Scan(Scan),
    /// Nothing newer arrived in time. Carries the newest id (0 if none).
    Timeout { latest_id: u64 },
}

#[derive(Debug)]
struct LogState {
    scans: VecDeque<Scan>,
    next_id: u64,
}

/// Append-only log of accepted scans with long-poll readers.
///
/// Ids start at 1 and are allocated under the same lock that stores the
/// scan, so they are unique and gap-free. Every append publishes the newest
/// id on a watch channel; each waiter re-checks its own cursor against it.
/// Only the newest `retention` scans are kept.
#[derive(Debug)]
pub struct ScanLog {
    state: Mutex<LogState>,
    latest: watch::Sender<u64>,
    retention: usize,
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl ScanLog {
    /// New empty log keeping at most `retention` scans (at least 1).
    pub fn new(retention: usize) -> Self {
        let (latest, _) = watch::channel(0);
        Self {
            state: Mutex::new(LogState {
                scans: VecDeque::new(),
                next_id: 1,
            }),
            latest,
            retention: retention.max(1),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Store a new scan stamped with the current time and wake waiters.
    pub fn append(&self, code: impl Into<String>, symbology: Symbology) -> Scan {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let scan = Scan {
            id: state.next_id,
            code: code.into(),
            symbology,
            timestamp: Utc::now(),
        };
        state.next_id += 1;
        state.scans.push_back(scan.clone());
        while state.scans.len() > self.retention {
            state.scans.pop_front();
        }
        drop(state);
        // concurrent appenders may publish out of order; keep the maximum
        self.latest.send_modify(|latest| *latest = (*latest).max(scan.id));
        scan
    }

    /// Newest id handed out, 0 if none yet.
    pub fn latest_id(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).next_id - 1
    }

    /// Number of scans currently retained.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The oldest retained scan with an id above `since_id`.
    pub fn find_after(&self, since_id: u64) -> Option<Scan> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let oldest = state.scans.front()?.id;
        if since_id < oldest {
            return state.scans.front().cloned();
        }
        // retained ids are contiguous
        let offset = usize::try_from(since_id - oldest + 1).ok()?;
        state.scans.get(offset).cloned()
    }

    /// Up to `count` of the newest scans, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Scan> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let skip = state.scans.len().saturating_sub(count);
        state.scans.iter().skip(skip).cloned().collect()
    }

    /// Wait until a scan with an id above `since_id` exists, or `timeout`.
    ///
    /// Returns at once when such a scan is already retained.
    pub async fn await_after(&self, since_id: u64, timeout: Duration) -> AwaitOutcome {
        let mut latest = self.latest.subscribe();
        let wait = latest.wait_for(|latest_id| *latest_id > since_id);
        // the watch guard must be gone before the log lock is taken
        let woke = matches!(tokio::time::timeout(timeout, wait).await, Ok(Ok(_)));
        if woke {
            if let Some(scan) = self.find_after(since_id) {
                return AwaitOutcome::Scan(scan);
            }
        }
        AwaitOutcome::Timeout {
            latest_id: self.latest_id(),
        }
    }
}
