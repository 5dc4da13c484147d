//! Per-record outcome of a stage call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a record produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The encoder declined the input; nothing was sent to the worker.
    Encoder,
    /// The worker answered, but the decoder produced nothing to emit.
    Decoder,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoder => write!(f, "encoder"),
            Self::Decoder => write!(f, "decoder"),
        }
    }
}

/// The successful result of processing one record: either one record to
/// emit downstream, or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Emit this record downstream.
    Emit(T),
    /// Emit nothing for this record.
    Skip(SkipReason),
}

impl<T> Outcome<T> {
    /// Returns true if there is a record to emit.
    #[must_use]
    pub const fn is_emit(&self) -> bool {
        matches!(self, Self::Emit(_))
    }

    /// Returns the skip reason, if any.
    #[must_use]
    pub const fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Emit(_) => None,
            Self::Skip(reason) => Some(*reason),
        }
    }

    /// Converts into the emitted record, dropping the skip reason.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Emit(value) => Some(value),
            Self::Skip(_) => None,
        }
    }

    /// Maps the emitted record.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Emit(value) => Outcome::Emit(f(value)),
            Self::Skip(reason) => Outcome::Skip(reason),
        }
    }
}
