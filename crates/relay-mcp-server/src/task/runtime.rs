//! Task Runtime: bridges task storage with runtime execution state.
//!
//! `TaskRuntime` combines a `TaskStorage` backend (the single source of truth
//! for task status and results) with a pluggable `TaskExecutor`, a fail-fast
//! concurrency limiter and the task hooks. Status notifications go out on the
//! owning session's outbound channel when a session registry is attached.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use relay_mcp_protocol::methods;
use relay_mcp_protocol::tasks::TaskStatusNotificationParams;
use relay_mcp_protocol::{McpError, McpResult, TaskMetadata, TaskStatus};
use relay_mcp_task_storage::{
    InMemoryTaskStorage, TaskListPage, TaskOutcome, TaskRecord, TaskStorage, TaskStorageError,
};

use crate::cancellation::CancellationHandle;
use crate::session::SessionRegistry;
use crate::task::executor::{BoxedTaskWork, TaskExecutor};
use crate::task::hooks::TaskHooks;
use crate::task::map_storage_error;
use crate::task::tokio_executor::TokioTaskExecutor;

/// The body of a task: given its id and cancellation handle, produce the
/// outcome that `tasks/result` will hand back.
pub type TaskBody =
    Box<dyn FnOnce(String, CancellationHandle) -> BoxFuture<'static, TaskOutcome> + Send>;

/// Values applied when a task-augmented request leaves them out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskDefaults {
    pub ttl_ms: Option<i64>,
    pub poll_interval_ms: Option<u64>,
}

/// Bridges task storage with runtime execution state.
pub struct TaskRuntime {
    storage: Arc<dyn TaskStorage>,
    executor: Arc<dyn TaskExecutor>,
    /// `None` = unlimited
    limiter: Option<Arc<Semaphore>>,
    max_concurrent: usize,
    defaults: TaskDefaults,
    hooks: TaskHooks,
    sessions: Option<Arc<SessionRegistry>>,
}

impl TaskRuntime {
    pub fn new(storage: Arc<dyn TaskStorage>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            storage,
            executor,
            limiter: None,
            max_concurrent: 0,
            defaults: TaskDefaults::default(),
            hooks: TaskHooks::default(),
            sessions: None,
        }
    }

    /// Create a task runtime with the given storage and the default `TokioTaskExecutor`.
    pub fn with_default_executor(storage: Arc<dyn TaskStorage>) -> Self {
        Self::new(storage, Arc::new(TokioTaskExecutor::new()))
    }

    pub fn in_memory() -> Self {
        Self::with_default_executor(Arc::new(InMemoryTaskStorage::new()))
    }

    /// Cap simultaneously executing bodies; `0` removes the cap.
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self.limiter = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn with_defaults(mut self, defaults: TaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_hooks(mut self, hooks: TaskHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Route `notifications/tasks/status` through these sessions.
    pub fn with_session_registry(mut self, sessions: Arc<SessionRegistry>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn storage(&self) -> &dyn TaskStorage {
        self.storage.as_ref()
    }

    pub fn executor(&self) -> &dyn TaskExecutor {
        self.executor.as_ref()
    }

    pub fn defaults(&self) -> TaskDefaults {
        self.defaults
    }

    /// Free execution slots, or `None` when unlimited.
    pub fn available_permits(&self) -> Option<usize> {
        self.limiter.as_ref().map(|l| l.available_permits())
    }

    // === Task Lifecycle ===

    /// A fresh `working` record for `method`, with request options falling
    /// back to the runtime defaults.
    pub fn new_record(
        &self,
        method: &str,
        session_id: Option<&str>,
        metadata: &TaskMetadata,
    ) -> TaskRecord {
        let record = TaskRecord::new(InMemoryTaskStorage::generate_task_id(), method)
            .with_ttl(metadata.ttl.or(self.defaults.ttl_ms))
            .with_poll_interval(metadata.poll_interval.or(self.defaults.poll_interval_ms));
        match session_id {
            Some(id) => record.with_session(id),
            None => record,
        }
    }

    /// Store `record` and start `body` on the executor.
    ///
    /// An execution slot is reserved before anything is stored: at capacity
    /// this fails with `ResourceExhausted` and no task exists afterwards.
    /// The slot is released when the body finishes or is cancelled.
    pub async fn spawn_task(
        self: &Arc<Self>,
        record: TaskRecord,
        body: TaskBody,
    ) -> McpResult<TaskRecord> {
        let permit = self.try_reserve_slot()?;

        let created = self
            .storage
            .create_task(record)
            .await
            .map_err(map_storage_error)?;
        debug!(task_id = %created.task_id, method = %created.original_method, "Task created");
        self.hooks.task_created(&created);

        let runtime = Arc::clone(self);
        let task_id = created.task_id.clone();
        let work: BoxedTaskWork = Box::new(move |cancellation| {
            Box::pin(async move {
                let _permit = permit;
                let outcome = body(task_id.clone(), cancellation).await;
                runtime.finish_task(&task_id, outcome).await;
            })
        });

        if let Err(err) = self.executor.start_task(&created.task_id, work).await {
            error!(task_id = %created.task_id, error = %err, "Failed to start task body");
            let failure = TaskOutcome::Error {
                code: relay_mcp_json_rpc_server::error_codes::INTERNAL_ERROR,
                message: format!("Failed to start task: {}", err),
                data: None,
            };
            self.finish_task(&created.task_id, failure).await;
            return Err(map_storage_error(err));
        }

        Ok(created)
    }

    fn try_reserve_slot(&self) -> McpResult<Option<OwnedSemaphorePermit>> {
        let Some(limiter) = &self.limiter else {
            return Ok(None);
        };
        match Arc::clone(limiter).try_acquire_owned() {
            Ok(permit) => Ok(Some(permit)),
            Err(TryAcquireError::NoPermits) => {
                warn!(limit = self.max_concurrent, "Task concurrency limit reached");
                Err(McpError::ResourceExhausted(format!(
                    "maximum of {} concurrent tasks reached",
                    self.max_concurrent
                )))
            }
            Err(TryAcquireError::Closed) => Err(McpError::ResourceExhausted(
                "task limiter is closed".to_string(),
            )),
        }
    }

    /// Record a body's outcome. Loses silently to an earlier terminal
    /// transition (e.g. a cancel) or to expiry.
    async fn finish_task(&self, task_id: &str, outcome: TaskOutcome) {
        match self.storage.complete_task(task_id, outcome, None).await {
            Ok(Some(record)) => {
                debug!(task_id = %task_id, status = %record.status, "Task finished");
                self.after_transition(&record);
            }
            Ok(None) => {
                debug!(task_id = %task_id, "Task already terminal; outcome discarded");
            }
            Err(TaskStorageError::TaskNotFound(_)) => {
                debug!(task_id = %task_id, "Task expired before its body finished");
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "Failed to record task outcome");
            }
        }
    }

    /// Handler-driven status change, e.g. `working` <-> `input_required`.
    pub async fn update_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        status_message: Option<String>,
    ) -> McpResult<TaskRecord> {
        let updated = self
            .storage
            .update_task_status(task_id, new_status, status_message)
            .await
            .map_err(map_storage_error)?;
        self.after_transition(&updated);
        Ok(updated)
    }

    /// Cancel a task: transition storage first, then signal the body.
    ///
    /// Fails with `InvalidParameters` when the task already finished.
    pub async fn cancel_task(
        &self,
        task_id: &str,
        session_id: Option<&str>,
        reason: Option<String>,
    ) -> McpResult<TaskRecord> {
        self.get_task(task_id, session_id).await?;

        let cancelled = self
            .storage
            .cancel_task(
                task_id,
                reason.or_else(|| Some("Cancelled by client".to_string())),
            )
            .await
            .map_err(map_storage_error)?;

        if !self.executor.cancel_task(task_id).await {
            debug!(task_id = %task_id, "No running body to signal");
        }
        self.after_transition(&cancelled);
        Ok(cancelled)
    }

    fn after_transition(&self, record: &TaskRecord) {
        if record.is_terminal() {
            self.hooks.task_finished(record);
        }
        self.notify_status(record);
    }

    /// Best-effort `notifications/tasks/status` to the owning session.
    fn notify_status(&self, record: &TaskRecord) {
        let (Some(sessions), Some(session_id)) = (&self.sessions, &record.session_id) else {
            return;
        };
        let Some(session) = sessions.get_session(session_id) else {
            debug!(task_id = %record.task_id, session_id = %session_id, "Owning session is gone");
            return;
        };

        let params = TaskStatusNotificationParams {
            task: record.to_protocol_task(),
        };
        if let Err(err) = session.notify_typed(methods::NOTIFICATION_TASK_STATUS, &params) {
            warn!(
                task_id = %record.task_id,
                session_id = %session_id,
                error = %err,
                "Dropped task status notification"
            );
        }
    }

    // === Reads ===

    /// Fetch a task the caller may see. A task bound to another session is
    /// reported exactly like a missing one; `None` sees every task.
    pub async fn get_task(&self, task_id: &str, session_id: Option<&str>) -> McpResult<TaskRecord> {
        let record = self
            .storage
            .get_task(task_id)
            .await
            .map_err(map_storage_error)?
            .filter(|record| session_id.is_none() || record.visible_to(session_id))
            .ok_or_else(|| McpError::TaskNotFound(task_id.to_string()))?;
        Ok(record)
    }

    pub async fn list_tasks(
        &self,
        session_id: Option<&str>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> McpResult<TaskListPage> {
        let page = match session_id {
            Some(id) => self.storage.list_tasks_for_session(id, cursor, limit).await,
            None => self.storage.list_tasks(cursor, limit).await,
        };
        page.map_err(map_storage_error)
    }

    /// Suspend until the task is terminal. Dropping the future leaves the
    /// task untouched.
    pub async fn await_terminal(
        &self,
        task_id: &str,
        session_id: Option<&str>,
    ) -> McpResult<TaskRecord> {
        self.get_task(task_id, session_id).await?;
        self.storage
            .wait_for_terminal(task_id)
            .await
            .map_err(map_storage_error)
    }

    pub fn running_count(&self) -> usize {
        self.executor.running_count()
    }

    // === Expiry ===

    /// Remove every task past its TTL. Returns how many were removed.
    pub async fn expire_tasks(&self) -> McpResult<usize> {
        let expired = self
            .storage
            .expire_tasks()
            .await
            .map_err(map_storage_error)?;
        Ok(expired.len())
    }

    /// Spawn the periodic TTL sweep.
    pub fn start_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        info!(period_ms = period.as_millis() as u64, "Starting task TTL sweeper");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = self.expire_tasks().await {
                    error!(error = %err, "Task sweep failed");
                }
            }
        })
    }
}
