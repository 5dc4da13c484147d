//! Error types for external process stages.
//!
//! The taxonomy separates failures that end a stage instance (startup and
//! worker loss) from per-record failures that leave the worker usable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The stage could not reach `Running`.
    StartupFailed,
    /// The worker is gone or unresponsive.
    WorkerUnavailable,
    /// An input record could not be encoded.
    Encoding,
    /// A worker response could not be decoded.
    Decoding,
    /// The stage configuration is invalid or unreadable.
    Config,
    /// The downstream consumer stopped accepting records.
    Downstream,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartupFailed => write!(f, "startup_failed"),
            Self::WorkerUnavailable => write!(f, "worker_unavailable"),
            Self::Encoding => write!(f, "encoding"),
            Self::Decoding => write!(f, "decoding"),
            Self::Config => write!(f, "config"),
            Self::Downstream => write!(f, "downstream"),
        }
    }
}

/// The main error type for stage operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The stage failed to start.
    #[error("Stage '{stage}' failed to start: {reason}")]
    StartupFailed {
        /// The stage name.
        stage: String,
        /// What went wrong.
        reason: String,
    },

    /// The worker process exited, closed its output, or timed out.
    #[error("Worker for stage '{stage}' is unavailable: {reason}")]
    WorkerUnavailable {
        /// The stage name.
        stage: String,
        /// What went wrong.
        reason: String,
    },

    /// An input record could not be turned into a line.
    #[error("Encoding error in stage '{stage}': {source}")]
    Encoding {
        /// The stage name.
        stage: String,
        /// The codec failure.
        #[source]
        source: CodecError,
    },

    /// A worker response line could not be turned into a record.
    #[error("Decoding error in stage '{stage}': {source}")]
    Decoding {
        /// The stage name.
        stage: String,
        /// The offending line, truncated for diagnostics.
        line: String,
        /// The codec failure.
        #[source]
        source: CodecError,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An emitted record could not be delivered downstream.
    #[error("Downstream closed: {0}")]
    Downstream(String),
}

/// Maximum number of characters of a worker line kept in a decoding error.
const MAX_LINE_EXCERPT: usize = 256;

impl BridgeError {
    /// Creates a startup failure.
    #[must_use]
    pub fn startup(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Creates a worker-unavailable failure.
    #[must_use]
    pub fn unavailable(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerUnavailable {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Creates an encoding failure.
    #[must_use]
    pub fn encoding(stage: impl Into<String>, source: CodecError) -> Self {
        Self::Encoding {
            stage: stage.into(),
            source,
        }
    }

    /// Creates a decoding failure, keeping an excerpt of the offending line.
    #[must_use]
    pub fn decoding(stage: impl Into<String>, line: &str, source: CodecError) -> Self {
        let line = if line.chars().count() > MAX_LINE_EXCERPT {
            let mut excerpt: String = line.chars().take(MAX_LINE_EXCERPT).collect();
            excerpt.push_str("...");
            excerpt
        } else {
            line.to_string()
        };
        Self::Decoding {
            stage: stage.into(),
            line,
            source,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StartupFailed { .. } => ErrorKind::StartupFailed,
            Self::WorkerUnavailable { .. } => ErrorKind::WorkerUnavailable,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::Decoding { .. } => ErrorKind::Decoding,
            Self::Config(_) => ErrorKind::Config,
            Self::Downstream(_) => ErrorKind::Downstream,
        }
    }

    /// Returns true if the error leaves the worker usable for later records.
    #[must_use]
    pub const fn is_record_level(&self) -> bool {
        matches!(self, Self::Encoding { .. } | Self::Decoding { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::StartupFailed { stage, reason } | Self::WorkerUnavailable { stage, reason } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            Self::Encoding { stage, .. } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
            }
            Self::Decoding { stage, line, .. } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("line".to_string(), serde_json::json!(line));
            }
            Self::Config(_) | Self::Downstream(_) => {}
        }

        map
    }
}

/// Failure raised by a codec while encoding or decoding a single record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An encoded record spans more than one line.
    #[error("Encoded record contains a line break")]
    MultiLine,

    /// A codec-specific failure.
    #[error("{0}")]
    Custom(String),
}

impl CodecError {
    /// Creates a custom codec error.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            BridgeError::startup("s", "no archive").kind(),
            ErrorKind::StartupFailed
        );
        assert_eq!(
            BridgeError::unavailable("s", "eof").kind(),
            ErrorKind::WorkerUnavailable
        );
        assert_eq!(
            BridgeError::encoding("s", CodecError::MultiLine).kind(),
            ErrorKind::Encoding
        );
        assert_eq!(BridgeError::config("bad").kind(), ErrorKind::Config);
    }

    #[test]
    fn test_record_level_errors() {
        assert!(BridgeError::encoding("s", CodecError::MultiLine).is_record_level());
        assert!(BridgeError::decoding("s", "x", CodecError::custom("nope")).is_record_level());
        assert!(!BridgeError::unavailable("s", "eof").is_record_level());
        assert!(!BridgeError::startup("s", "spawn").is_record_level());
    }

    #[test]
    fn test_decoding_error_truncates_line() {
        let long = "x".repeat(1000);
        let err = BridgeError::decoding("s", &long, CodecError::custom("bad"));

        match err {
            BridgeError::Decoding { line, .. } => {
                assert_eq!(line.len(), MAX_LINE_EXCERPT + 3);
                assert!(line.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_to_dict() {
        let err = BridgeError::unavailable("sentiment", "worker closed its output");
        let dict = err.to_dict();

        assert_eq!(dict.get("kind").unwrap(), "worker_unavailable");
        assert_eq!(dict.get("stage").unwrap(), "sentiment");
        assert_eq!(dict.get("reason").unwrap(), "worker closed its output");
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::startup("sentiment", "executable not found");
        assert_eq!(
            err.to_string(),
            "Stage 'sentiment' failed to start: executable not found"
        );
        assert_eq!(ErrorKind::Decoding.to_string(), "decoding");
    }
}
