//! Per-stage record counters.

use crate::core::SkipReason;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by a stage as records flow through it.
#[derive(Debug, Default)]
pub struct StageStats {
    received: AtomicU64,
    emitted: AtomicU64,
    skipped_by_encoder: AtomicU64,
    skipped_by_decoder: AtomicU64,
    record_errors: AtomicU64,
}

/// A point-in-time copy of [`StageStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Records handed to `process`.
    pub received: u64,
    /// Records that produced output.
    pub emitted: u64,
    /// Records the encoder declined.
    pub skipped_by_encoder: u64,
    /// Worker responses the decoder turned into nothing.
    pub skipped_by_decoder: u64,
    /// Records that failed with an error.
    pub record_errors: u64,
}

impl StageStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::Encoder => &self.skipped_by_encoder,
            SkipReason::Decoder => &self.skipped_by_decoder,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.record_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            skipped_by_encoder: self.skipped_by_encoder.load(Ordering::Relaxed),
            skipped_by_decoder: self.skipped_by_decoder.load(Ordering::Relaxed),
            record_errors: self.record_errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Records that produced no output, for either reason.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped_by_encoder + self.skipped_by_decoder
    }
}
