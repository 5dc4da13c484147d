//! Lifecycle events and the sinks that receive them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};
use uuid::Uuid;

/// A lifecycle transition of one stage instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Event type, e.g. `stage.started`.
    pub event_type: String,
    /// Stage name.
    pub stage: String,
    /// Identifies the stage instance across restarts of the same name.
    pub instance_id: Uuid,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Event-specific payload.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl LifecycleEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, stage: impl Into<String>, instance_id: Uuid) -> Self {
        Self {
            event_type: event_type.into(),
            stage: stage.into(),
            instance_id,
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Receives lifecycle events.
///
/// Emission must not block or fail; sinks log and drop what they cannot
/// deliver.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &LifecycleEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &LifecycleEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.event_type,
                stage = %event.stage,
                instance_id = %event.instance_id,
                data = %event.data,
                "Event: {}", event.event_type
            );
        } else {
            info!(
                event_type = %event.event_type,
                stage = %event.stage,
                instance_id = %event.instance_id,
                data = %event.data,
                "Event: {}", event.event_type
            );
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<LifecycleEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> LifecycleEvent {
        LifecycleEvent::new(event_type, "sentiment", Uuid::new_v4())
    }

    #[test]
    fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit(&event("stage.started"));
        LoggingEventSink::default().emit(&event("stage.started"));
        LoggingEventSink::debug().emit(&event("stage.stopped").with_data(serde_json::json!({"x": 1})));
        // Should not panic
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&event("stage.started"));
        sink.emit(&event("stage.stopped"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["stage.started", "stage.stopped"]);
    }

    #[test]
    fn test_collecting_sink_filter_and_clear() {
        let sink = CollectingEventSink::new();
        sink.emit(&event("stage.started"));
        sink.emit(&event("stage.stopped"));
        sink.emit(&event("runner.finished"));

        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events_of_type("runner.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_event_serialization_omits_null_data() {
        let json = serde_json::to_value(event("stage.started")).unwrap();
        assert!(json.get("data").is_none());

        let json = serde_json::to_value(
            event("stage.stopped").with_data(serde_json::json!({"killed": false})),
        )
        .unwrap();
        assert_eq!(json["data"]["killed"], false);
    }
}
