//! Running stages over record streams.
//!
//! A [`StageRunner`] pulls records from a channel or iterator, passes them
//! through one stage and hands every emitted record to an [`Emitter`].
//! Connecting the emitter of one runner to the input of the next wires
//! stages into a flow.

mod emitter;
mod failure;
mod runner;

pub use emitter::{CollectingEmitter, Emitter};
pub use failure::{FailureMode, FailureRecord};
pub use runner::{RunSummary, StageRunner};
