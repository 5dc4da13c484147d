//! Configuration for external process stages.

use crate::errors::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder expanded to the absolute working directory in the
/// executable and arguments.
pub const WORK_DIR_PLACEHOLDER: &str = "{work_dir}";

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "STAGEBRIDGE";

/// Configuration of an external process stage.
///
/// Immutable once the stage starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name used in logs, events and errors.
    #[serde(default = "default_name")]
    pub name: String,
    /// Executable to launch. A bare name is looked up on `PATH`.
    pub executable: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory owned by the stage. Must not exist yet.
    /// A fresh temporary directory is used when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Zip archive unpacked into the working directory at startup.
    #[serde(default)]
    pub archive: Option<PathBuf>,
    /// Extra environment variables for the worker.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-call read timeout in seconds. Unset means wait indefinitely.
    #[serde(default)]
    pub read_timeout_seconds: Option<f64>,
    /// How long stop waits for the worker to exit before killing it.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: f64,
    /// Consecutive decode failures after which the worker is treated as
    /// unavailable. Unset means decode failures never affect the worker.
    #[serde(default)]
    pub max_consecutive_decode_failures: Option<u32>,
}

fn default_name() -> String {
    "external".to_string()
}

fn default_shutdown_grace() -> f64 {
    5.0
}

impl StageConfig {
    /// Creates a configuration for the given executable with defaults.
    #[must_use]
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            archive: None,
            env: HashMap::new(),
            read_timeout_seconds: None,
            shutdown_grace_seconds: default_shutdown_grace(),
            max_consecutive_decode_failures: None,
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BridgeError::config(format!("failed to parse stage config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replaces the arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the resource archive.
    #[must_use]
    pub fn with_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    /// Adds an environment variable for the worker.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the per-call read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, seconds: f64) -> Self {
        self.read_timeout_seconds = Some(seconds);
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, seconds: f64) -> Self {
        self.shutdown_grace_seconds = seconds;
        self
    }

    /// Sets the decode failure escalation threshold.
    #[must_use]
    pub fn with_max_consecutive_decode_failures(mut self, count: u32) -> Self {
        self.max_consecutive_decode_failures = Some(count);
        self
    }

    /// Gets the read timeout as a `Duration`.
    ///
    /// Values too large for a `Duration` saturate to `Duration::MAX`.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_seconds.map(saturating_duration)
    }

    /// Gets the shutdown grace period as a `Duration`.
    ///
    /// Values too large for a `Duration` saturate to `Duration::MAX`.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        saturating_duration(self.shutdown_grace_seconds.max(0.0))
    }

    /// Checks the configuration for values that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BridgeError::config("stage name must not be empty"));
        }
        if self.executable.trim().is_empty() {
            return Err(BridgeError::config("executable must not be empty"));
        }
        if let Some(timeout) = self.read_timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(BridgeError::config(format!(
                    "read_timeout_seconds must be positive, got {timeout}"
                )));
            }
            if Duration::try_from_secs_f64(timeout).is_err() {
                return Err(BridgeError::config(format!(
                    "read_timeout_seconds is out of range, got {timeout}"
                )));
            }
        }
        let grace = self.shutdown_grace_seconds;
        if !grace.is_finite() || grace < 0.0 {
            return Err(BridgeError::config(format!(
                "shutdown_grace_seconds must not be negative, got {grace}"
            )));
        }
        if Duration::try_from_secs_f64(grace).is_err() {
            return Err(BridgeError::config(format!(
                "shutdown_grace_seconds is out of range, got {grace}"
            )));
        }
        if self.max_consecutive_decode_failures == Some(0) {
            return Err(BridgeError::config(
                "max_consecutive_decode_failures must be at least 1",
            ));
        }
        Ok(())
    }

    /// Applies overrides from `STAGEBRIDGE_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_env_overrides(DEFAULT_ENV_PREFIX)
    }

    /// Applies overrides from the process environment.
    ///
    /// See [`StageConfig::apply_overrides_from`] for the recognised keys.
    pub fn apply_env_overrides(self, prefix: &str) -> Result<Self> {
        self.apply_overrides_from(prefix, |key| std::env::var(key).ok())
    }

    /// Applies overrides from a key lookup.
    ///
    /// Recognised keys are `{prefix}_NAME`, `{prefix}_EXECUTABLE`,
    /// `{prefix}_ARGS` (whitespace separated), `{prefix}_WORKING_DIR`,
    /// `{prefix}_ARCHIVE`, `{prefix}_READ_TIMEOUT_SECONDS` and
    /// `{prefix}_SHUTDOWN_GRACE_SECONDS`.
    pub fn apply_overrides_from<F>(mut self, prefix: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));

        if let Some(name) = get("NAME") {
            self.name = name;
        }
        if let Some(executable) = get("EXECUTABLE") {
            self.executable = executable;
        }
        if let Some(args) = get("ARGS") {
            self.args = args.split_whitespace().map(String::from).collect();
        }
        if let Some(dir) = get("WORKING_DIR") {
            self.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(archive) = get("ARCHIVE") {
            self.archive = Some(PathBuf::from(archive));
        }
        if let Some(timeout) = get("READ_TIMEOUT_SECONDS") {
            self.read_timeout_seconds = Some(parse_seconds("READ_TIMEOUT_SECONDS", &timeout)?);
        }
        if let Some(grace) = get("SHUTDOWN_GRACE_SECONDS") {
            self.shutdown_grace_seconds = parse_seconds("SHUTDOWN_GRACE_SECONDS", &grace)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Expands the working directory placeholder in the executable and
    /// arguments.
    #[must_use]
    pub fn expand_placeholders(&self, work_dir: &Path) -> (String, Vec<String>) {
        let dir = work_dir.to_string_lossy();
        let executable = self.executable.replace(WORK_DIR_PLACEHOLDER, &dir);
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace(WORK_DIR_PLACEHOLDER, &dir))
            .collect();
        (executable, args)
    }
}

fn saturating_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

fn parse_seconds(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| BridgeError::config(format!("{key}: '{value}' is not a number: {e}")))
}
