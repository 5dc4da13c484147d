//! A stage that delegates each record to a long-lived external process.
//!
//! The worker speaks a line-oriented protocol: one encoded record per line
//! on its standard input, one response line on its standard output, in
//! strict alternation. Calls are serialized by an internal fair mutex, so
//! concurrent callers see FIFO request/response pairing.

use super::{RecordStage, StopReport};
use crate::cancellation::CancellationToken;
use crate::codec::{self, Codec};
use crate::config::StageConfig;
use crate::core::{Outcome, SkipReason, StageState};
use crate::errors::{BridgeError, CodecError, Result};
use crate::events::{
    EventSink, LifecycleEvent, NoOpEventSink, STAGE_STARTED, STAGE_START_FAILED, STAGE_STOPPED,
    STAGE_WORKER_UNAVAILABLE,
};
use crate::observability::{StageStats, StatsSnapshot};
use crate::staging::{self, ArchiveSource, WorkDir};
use crate::worker::{resolve_executable, LaunchSpec, WorkerError, WorkerHandle};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Resources owned while the stage is between start and stop.
#[derive(Debug, Default)]
struct Resources {
    worker: Option<WorkerHandle>,
    work_dir: Option<WorkDir>,
    consecutive_decode_failures: u32,
}

/// Adapts a one-line-in, one-line-out executable into a typed stage.
pub struct ExternalProcessStage<C: Codec> {
    config: StageConfig,
    archive: Option<ArchiveSource>,
    codec: C,
    instance_id: Uuid,
    state: RwLock<StageState>,
    resources: Mutex<Resources>,
    shutdown: CancellationToken,
    stats: StageStats,
    sink: Arc<dyn EventSink>,
}

impl<C: Codec> ExternalProcessStage<C> {
    /// Creates a stage from its configuration and codec.
    ///
    /// The configured archive path, if any, is unpacked at startup.
    pub fn new(config: StageConfig, codec: C) -> Self {
        let archive = config.archive.clone().map(ArchiveSource::File);
        Self {
            config,
            archive,
            codec,
            instance_id: Uuid::new_v4(),
            state: RwLock::new(StageState::Created),
            resources: Mutex::new(Resources::default()),
            shutdown: CancellationToken::new(),
            stats: StageStats::new(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Uses an in-memory archive instead of the configured path.
    #[must_use]
    pub fn with_archive_bytes(mut self, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.archive = Some(ArchiveSource::from_bytes(bytes));
        self
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Returns the id distinguishing this instance in events.
    #[must_use]
    pub const fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Returns the record counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the working directory while it exists.
    pub async fn work_dir(&self) -> Option<PathBuf> {
        let resources = self.resources.lock().await;
        resources
            .work_dir
            .as_ref()
            .filter(|dir| !dir.is_removed())
            .map(|dir| dir.path().to_path_buf())
    }

    /// Returns the worker's process id while it is attached.
    pub async fn worker_pid(&self) -> Option<u32> {
        self.resources
            .lock()
            .await
            .worker
            .as_ref()
            .and_then(WorkerHandle::pid)
    }

    fn set_state(&self, state: StageState) -> StageState {
        std::mem::replace(&mut *self.state.write(), state)
    }

    fn emit_event(&self, event_type: &str, data: serde_json::Value) {
        let event = LifecycleEvent::new(event_type, &self.config.name, self.instance_id)
            .with_data(data);
        self.sink.emit(&event);
    }

    /// Prepares the working directory and launches the worker.
    ///
    /// Anything created before a failure stays in `resources` for `stop`.
    async fn launch(&self, resources: &mut Resources) -> Result<Option<u32>> {
        let name = &self.config.name;
        let startup = |reason: String| BridgeError::startup(name, reason);

        self.config.validate().map_err(|e| startup(e.to_string()))?;

        // Checked before the directory exists so a missing archive leaves nothing behind.
        if let Some(archive) = &self.archive {
            archive.check_exists().map_err(|e| startup(e.to_string()))?;
        }

        let work_dir = WorkDir::create(self.config.working_dir.as_deref())
            .map_err(|e| startup(format!("cannot create working directory: {e}")))?;
        let work_path = work_dir.path().to_path_buf();
        resources.work_dir = Some(work_dir);

        if let Some(archive) = self.archive.clone() {
            let dest = work_path.clone();
            let report = tokio::task::spawn_blocking(move || staging::unpack(&archive, &dest))
                .await
                .map_err(|e| startup(format!("archive unpacking panicked: {e}")))?
                .map_err(|e| startup(e.to_string()))?;
            debug!(
                stage = %name,
                files = report.files,
                bytes = report.bytes,
                "Staged archive"
            );
        }

        let (raw_executable, args) = self.config.expand_placeholders(&work_path);
        let executable =
            resolve_executable(&raw_executable, &work_path).map_err(|e| startup(e.to_string()))?;
        let spec = LaunchSpec {
            executable,
            args,
            current_dir: work_path,
            env: self.config.env.clone(),
        };

        let worker = WorkerHandle::spawn(&spec, name).map_err(|e| startup(e.to_string()))?;
        let pid = worker.pid();
        resources.worker = Some(worker);
        Ok(pid)
    }

    /// Marks the worker as lost and builds the error for the caller.
    fn worker_lost(&self, resources: &mut Resources, reason: String) -> BridgeError {
        self.set_state(StageState::Failed);
        self.stats.record_error();

        let exit_code = resources
            .worker
            .as_mut()
            .and_then(WorkerHandle::try_exit_code);
        error!(
            stage = %self.config.name,
            exit_code = ?exit_code,
            "Worker unavailable: {}", reason
        );
        self.emit_event(
            STAGE_WORKER_UNAVAILABLE,
            serde_json::json!({ "reason": reason, "exit_code": exit_code }),
        );

        BridgeError::unavailable(&self.config.name, reason)
    }

    /// Error returned without any I/O when the stage cannot take records.
    fn rejected(&self, state: StageState) -> BridgeError {
        let reason = match state {
            StageState::Created => "stage has not been started",
            StageState::Starting => "stage is still starting",
            StageState::Failed => "worker was lost by an earlier call",
            StageState::Stopped | StageState::Running => "stage is stopping",
        };
        BridgeError::unavailable(&self.config.name, reason)
    }

    fn decode_failed(
        &self,
        resources: &mut Resources,
        line: &str,
        source: CodecError,
    ) -> BridgeError {
        resources.consecutive_decode_failures += 1;
        let failures = resources.consecutive_decode_failures;

        match self.config.max_consecutive_decode_failures {
            Some(max) if failures >= max => self.worker_lost(
                resources,
                format!("{failures} consecutive undecodable responses, last: {source}"),
            ),
            _ => {
                self.stats.record_error();
                warn!(
                    stage = %self.config.name,
                    consecutive = failures,
                    "Could not decode worker response: {}", source
                );
                BridgeError::decoding(&self.config.name, line, source)
            }
        }
    }
}

impl<C: Codec> std::fmt::Debug for ExternalProcessStage<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalProcessStage")
            .field("name", &self.config.name)
            .field("instance_id", &self.instance_id)
            .field("state", &*self.state.read())
            .field("executable", &self.config.executable)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Codec> RecordStage for ExternalProcessStage<C> {
    type Input = C::Input;
    type Output = C::Output;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn state(&self) -> StageState {
        *self.state.read()
    }

    async fn start(&self) -> Result<()> {
        let mut resources = self.resources.lock().await;

        let previous = {
            let mut state = self.state.write();
            let previous = *state;
            if previous == StageState::Created {
                *state = StageState::Starting;
            }
            previous
        };
        if previous != StageState::Created {
            return Err(BridgeError::startup(
                &self.config.name,
                format!("cannot start from state '{previous}'; create a new stage instead"),
            ));
        }

        info!(
            stage = %self.config.name,
            executable = %self.config.executable,
            "Starting external process stage"
        );

        match self.launch(&mut resources).await {
            Ok(pid) => {
                self.set_state(StageState::Running);
                info!(stage = %self.config.name, pid = ?pid, "Stage running");
                self.emit_event(STAGE_STARTED, serde_json::json!({ "pid": pid }));
                Ok(())
            }
            Err(err) => {
                self.set_state(StageState::Failed);
                error!(stage = %self.config.name, error = %err, "Stage failed to start");
                self.emit_event(STAGE_START_FAILED, serde_json::json!(err.to_dict()));
                Err(err)
            }
        }
    }

    async fn process(&self, input: C::Input) -> Result<Outcome<C::Output>> {
        let mut resources = self.resources.lock().await;

        let state = self.state();
        if !state.is_running() || self.shutdown.is_cancelled() {
            return Err(self.rejected(state));
        }
        self.stats.record_received();

        let line = match self.codec.encode(&input) {
            Ok(Some(line)) => line,
            Ok(None) => {
                self.stats.record_skipped(SkipReason::Encoder);
                return Ok(Outcome::Skip(SkipReason::Encoder));
            }
            Err(e) => {
                self.stats.record_error();
                return Err(BridgeError::encoding(&self.config.name, e));
            }
        };
        if let Err(e) = codec::ensure_single_line(&line) {
            self.stats.record_error();
            return Err(BridgeError::encoding(&self.config.name, e));
        }

        let timeout = self.config.read_timeout();
        let Some(worker) = resources.worker.as_mut() else {
            let reason = "no worker attached".to_string();
            return Err(self.worker_lost(&mut resources, reason));
        };

        let exchange = async {
            worker.send_line(&line).await?;
            worker.read_line(timeout).await
        };
        let response = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                self.stats.record_error();
                return Err(BridgeError::unavailable(&self.config.name, "stage is stopping"));
            }
            response = exchange => response,
        };

        let response = match response {
            Ok(Some(response)) => response,
            Ok(None) => {
                let reason = "worker closed its output".to_string();
                return Err(self.worker_lost(&mut resources, reason));
            }
            Err(WorkerError::InvalidUtf8) => {
                let source = CodecError::custom("worker output is not valid UTF-8");
                return Err(self.decode_failed(&mut resources, "", source));
            }
            Err(e) => return Err(self.worker_lost(&mut resources, e.to_string())),
        };

        match self.codec.decode(&response) {
            Ok(Some(output)) => {
                resources.consecutive_decode_failures = 0;
                self.stats.record_emitted();
                Ok(Outcome::Emit(output))
            }
            Ok(None) => {
                resources.consecutive_decode_failures = 0;
                self.stats.record_skipped(SkipReason::Decoder);
                Ok(Outcome::Skip(SkipReason::Decoder))
            }
            Err(e) => Err(self.decode_failed(&mut resources, &response, e)),
        }
    }

    async fn stop(&self) -> StopReport {
        // Wakes a call blocked on the worker so the lock below is released.
        self.shutdown.cancel("stage stopping");

        let mut resources = self.resources.lock().await;
        let previous = self.set_state(StageState::Stopped);
        let mut report = StopReport::new(&self.config.name, previous);
        if report.already_stopped {
            debug!(stage = %self.config.name, "Stage already stopped");
            return report;
        }

        if let Some(worker) = resources.worker.take() {
            let termination = worker.terminate(self.config.shutdown_grace()).await;
            debug!(
                stage = %self.config.name,
                pid = ?termination.pid,
                exit_code = ?termination.exit_code,
                killed = termination.killed,
                "Worker terminated"
            );
            report.worker = Some(termination);
        }

        if let Some(mut work_dir) = resources.work_dir.take() {
            report.work_dir_removed = work_dir.remove();
        }

        info!(
            stage = %self.config.name,
            previous_state = %previous,
            stats = ?self.stats.snapshot(),
            "Stage stopped"
        );
        self.emit_event(
            STAGE_STOPPED,
            serde_json::json!({
                "previous_state": previous,
                "killed": report.worker.map_or(false, |w| w.killed),
                "work_dir_removed": report.work_dir_removed,
                "stats": self.stats.snapshot(),
            }),
        );

        report
    }
}
