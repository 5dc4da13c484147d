//! # Stagebridge
//!
//! Pipeline stages that hand each record to a long-lived external worker
//! process and emit whatever the worker answers.
//!
//! The worker is any executable that reads one record per line on standard
//! input and writes one response line per record on standard output. A
//! stage provides:
//!
//! - **Lifecycle**: `start` stages resources and launches the worker, `stop`
//!   tears everything down and may be called any number of times
//! - **Resource staging**: an optional zip archive unpacked into a private
//!   working directory that is removed on stop
//! - **Typed records**: pluggable codecs between records and lines, with an
//!   explicit "produce nothing" answer in either direction
//! - **Failure isolation**: a lost worker fails the instance, a bad record
//!   only fails that record
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagebridge::prelude::*;
//!
//! let config = StageConfig::new("python3")
//!     .with_name("sentiment")
//!     .with_archive("sentiment.zip")
//!     .with_arg("{work_dir}/sentiment/score.py");
//!
//! let stage = ExternalProcessStage::new(config, JsonCodec::<Tweet, Scored>::new());
//! stage.start().await?;
//! let scored = stage.process(tweet).await?;
//! stage.stop().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod codec;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod staging;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::codec::{Codec, CodecExt, FnCodec, JsonCodec, LineCodec};
    pub use crate::config::StageConfig;
    pub use crate::core::{Outcome, SkipReason, StageState};
    pub use crate::errors::{BridgeError, CodecError, ErrorKind, Result};
    pub use crate::events::{
        CollectingEventSink, EventSink, LifecycleEvent, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::{init_logging, LogFormat, StatsSnapshot};
    pub use crate::pipeline::{
        CollectingEmitter, Emitter, FailureMode, FailureRecord, RunSummary, StageRunner,
    };
    pub use crate::stages::{
        Chain, ExternalProcessStage, FnStage, RecordStage, StopReport,
    };
    pub use crate::staging::ArchiveSource;
}
