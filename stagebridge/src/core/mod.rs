//! Core domain types shared by every stage.
//!
//! - The stage lifecycle state machine
//! - The per-record outcome returned by `process`

mod outcome;
mod status;

pub use outcome::{Outcome, SkipReason};
pub use status::StageState;
