//! Stage lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a stage instance.
///
/// ```text
/// Created -> Starting -> Running -> Stopped
///               |           |         ^
///               v           v         |
///             Failed -------+---------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Constructed but never started.
    #[default]
    Created,
    /// Unpacking resources and launching the worker.
    Starting,
    /// Accepting records.
    Running,
    /// Startup failed or the worker was lost.
    Failed,
    /// Shut down; the instance cannot be reused.
    Stopped,
}

impl StageState {
    /// Returns true if the stage accepts records.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if no further transition other than stop is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_created() {
        assert_eq!(StageState::default(), StageState::Created);
    }

    #[test]
    fn test_state_predicates() {
        assert!(StageState::Running.is_running());
        assert!(!StageState::Starting.is_running());
        assert!(StageState::Failed.is_terminal());
        assert!(StageState::Stopped.is_terminal());
        assert!(!StageState::Running.is_terminal());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&StageState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(StageState::Failed.to_string(), "failed");
    }
}
