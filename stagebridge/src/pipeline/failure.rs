//! Failure handling for stage runs.

use crate::errors::{BridgeError, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a runner reacts to a record that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop the run at the first failed record (default).
    #[default]
    FailFast,
    /// Record encoding and decoding failures and keep going.
    ///
    /// Worker loss still ends the run.
    ContinueOnFailure,
}

impl FailureMode {
    /// Returns true if a run may continue after `error`.
    #[must_use]
    pub const fn tolerates(self, error: &BridgeError) -> bool {
        matches!(self, Self::ContinueOnFailure) && error.is_record_level()
    }
}

/// Record of one failure during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage name.
    pub stage: String,
    /// Error message.
    pub error: String,
    /// Error classification.
    pub kind: ErrorKind,
    /// Whether the run went on after this failure.
    pub recoverable: bool,
    /// Zero-based position of the record in the input, if one was involved.
    pub record_index: Option<u64>,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a record from an error.
    #[must_use]
    pub fn from_error(stage: impl Into<String>, error: &BridgeError) -> Self {
        Self {
            stage: stage.into(),
            error: error.to_string(),
            kind: error.kind(),
            recoverable: false,
            record_index: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the index of the failed record.
    #[must_use]
    pub const fn at_record(mut self, index: u64) -> Self {
        self.record_index = Some(index);
        self
    }

    /// Marks as recoverable.
    #[must_use]
    pub const fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("error".to_string(), serde_json::json!(self.error));
        map.insert("kind".to_string(), serde_json::json!(self.kind));
        map.insert("recoverable".to_string(), serde_json::json!(self.recoverable));
        map.insert("record_index".to_string(), serde_json::json!(self.record_index));
        map.insert(
            "timestamp".to_string(),
            serde_json::json!(self.timestamp.to_rfc3339()),
        );
        map
    }
}
