use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Process memory at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub rss_mb: f64,
    pub vms_mb: f64,
    /// Resident memory as a share of total RAM.
    pub percent: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Samples this process's memory use.
pub struct MemorySampler {
    system: System,
    pid: Pid,
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        Self { system, pid }
    }

    /// Current usage, rounded to two decimals. `None` if the process table
    /// cannot be read on this platform.
    pub fn sample(&mut self) -> Option<MemoryUsage> {
        self.system.refresh_memory();
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]));
        let process = self.system.process(self.pid)?;

        let rss = process.memory() as f64;
        let vms = process.virtual_memory() as f64;
        let total = self.system.total_memory() as f64;
        let percent = if total > 0.0 { rss / total * 100.0 } else { 0.0 };

        Some(MemoryUsage {
            rss_mb: round2(rss / 1024.0 / 1024.0),
            vms_mb: round2(vms / 1024.0 / 1024.0),
            percent: round2(percent),
        })
    }
}

/// Number of OS threads in this process.
pub fn thread_count() -> Option<usize> {
    std::fs::read_dir("/proc/self/task")
        .ok()
        .map(|entries| entries.filter_map(|e| e.ok()).count())
}
