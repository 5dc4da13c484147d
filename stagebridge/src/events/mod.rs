//! Lifecycle event emission.
//!
//! Stages report lifecycle transitions (`stage.started`,
//! `stage.start_failed`, `stage.worker_unavailable`, `stage.stopped`) to an
//! [`EventSink`]. The default sink discards everything.

mod sink;

#[cfg(test)]
pub use sink::MockEventSink;
pub use sink::{
    CollectingEventSink, EventSink, LifecycleEvent, LoggingEventSink, NoOpEventSink,
};

/// Emitted when a stage reaches `Running`.
pub const STAGE_STARTED: &str = "stage.started";
/// Emitted when a stage fails to start.
pub const STAGE_START_FAILED: &str = "stage.start_failed";
/// Emitted when a stage loses its worker.
pub const STAGE_WORKER_UNAVAILABLE: &str = "stage.worker_unavailable";
/// Emitted when a stage has stopped.
pub const STAGE_STOPPED: &str = "stage.stopped";
