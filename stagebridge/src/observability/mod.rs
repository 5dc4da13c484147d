//! Observability utilities: log setup and per-stage counters.

mod logging;
mod stats;

pub use logging::{init_logging, LogFormat};
pub use stats::{StageStats, StatsSnapshot};
