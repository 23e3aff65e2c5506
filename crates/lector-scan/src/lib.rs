//! The capture → decode → delivery core.
//!
//! Two long-lived threads share state through explicit objects:
//!
//! - [`CaptureWorker`] owns the camera and publishes into the [`FrameSlot`],
//!   reporting faults through [`CaptureHealth`].
//! - [`DecodeWorker`] drains the slot, runs the decode strategies, applies
//!   [`Debounce`] and appends accepted scans to the [`ScanLog`].
//!
//! Request handlers only touch the slot, the log and the health/stat
//! handles. [`Pipeline`] wires everything together and tears it down.

pub mod capture;
pub mod debounce;
pub mod decode_worker;
pub mod error;
pub mod frame;
pub mod memory;
pub mod pipeline;
pub mod scanlog;
pub mod shutdown;

pub use capture::{CaptureHealth, CaptureSettings, CaptureWorker, NOT_INITIALIZED};
pub use debounce::{DEBOUNCE_WINDOW, Debounce};
pub use decode_worker::{DecodeSettings, DecodeStats, DecodeStatsSnapshot, DecodeWorker, FrameOutcome};
pub use error::ScanError;
pub use frame::{Frame, FrameSlot};
pub use memory::{MemorySampler, MemoryUsage, thread_count};
pub use pipeline::{Pipeline, PipelineConfig};
pub use scanlog::{AwaitOutcome, DEFAULT_AWAIT_TIMEOUT, DEFAULT_RETENTION, Scan, ScanLog};
pub use shutdown::Shutdown;
