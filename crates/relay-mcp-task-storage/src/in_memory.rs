//! In-memory task storage backend.
//!
//! The task map is behind a short-lived `RwLock` used only for lookup,
//! insert and removal. Each entry carries its own mutex, so transitions on
//! unrelated tasks never contend, plus a `watch` flag that flips to `true`
//! exactly once: on the winning terminal transition or on removal. The flag
//! is flipped while the entry lock is held, so a waiter can never observe a
//! terminal record without the signal or the other way around.
//!
//! Lock order is always map, then entry. Paths that start from an entry
//! release it before touching the map.

use crate::error::TaskStorageError;
use crate::state_machine;
use crate::traits::{TaskListPage, TaskOutcome, TaskRecord, TaskStorage, TtlPolicy};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard, RwLock};
use relay_mcp_protocol::TaskStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Configuration for the in-memory task storage backend.
#[derive(Debug, Clone)]
pub struct InMemoryTaskConfig {
    /// Maximum number of tasks to store (0 = unlimited)
    pub max_tasks: usize,
    /// Default page size for list operations
    pub default_page_size: u32,
    pub ttl_policy: TtlPolicy,
}

impl Default for InMemoryTaskConfig {
    fn default() -> Self {
        Self {
            max_tasks: 10_000,
            default_page_size: 50,
            ttl_policy: TtlPolicy::FromCreation,
        }
    }
}

struct EntryState {
    record: TaskRecord,
    removed: bool,
}

struct TaskEntry {
    state: Mutex<EntryState>,
    done: watch::Sender<bool>,
}

impl TaskEntry {
    fn new(record: TaskRecord) -> Self {
        let (done, _) = watch::channel(record.is_terminal());
        Self {
            state: Mutex::new(EntryState {
                record,
                removed: false,
            }),
            done,
        }
    }

    fn lock_live(&self, task_id: &str) -> Result<MutexGuard<'_, EntryState>, TaskStorageError> {
        let state = self.state.lock();
        if state.removed {
            return Err(TaskStorageError::TaskNotFound(task_id.to_string()));
        }
        Ok(state)
    }

    /// Terminal transition. Caller holds the entry lock.
    fn finish(
        &self,
        state: &mut EntryState,
        status: TaskStatus,
        status_message: Option<String>,
        outcome: Option<TaskOutcome>,
    ) {
        let now = Utc::now();
        let record = &mut state.record;
        record.status = status;
        record.status_message = status_message;
        record.last_updated_at = now;
        record.terminal_at = Some(now);
        if outcome.is_some() {
            record.result = outcome;
        }
        self.done.send_replace(true);
    }

    /// Mark removed and wake waiters. Caller holds the entry lock.
    fn retire(&self, state: &mut EntryState) {
        state.removed = true;
        self.done.send_replace(true);
    }
}

/// In-memory task storage backend.
#[derive(Clone)]
pub struct InMemoryTaskStorage {
    tasks: Arc<RwLock<HashMap<String, Arc<TaskEntry>>>>,
    config: InMemoryTaskConfig,
}

impl InMemoryTaskStorage {
    pub fn new() -> Self {
        Self::with_config(InMemoryTaskConfig::default())
    }

    pub fn with_config(config: InMemoryTaskConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Generate a new task ID using UUID v7 (temporal ordering).
    pub fn generate_task_id() -> String {
        Uuid::now_v7().to_string()
    }

    pub fn config(&self) -> &InMemoryTaskConfig {
        &self.config
    }

    /// Look up an entry, expiring it on the spot if its TTL has passed.
    fn live_entry(&self, task_id: &str) -> Result<Arc<TaskEntry>, TaskStorageError> {
        let entry = self
            .tasks
            .read()
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskStorageError::TaskNotFound(task_id.to_string()))?;

        let expired = {
            let mut state = entry.lock_live(task_id)?;
            if state.record.is_expired(self.config.ttl_policy, Utc::now()) {
                entry.retire(&mut state);
                true
            } else {
                false
            }
        };

        if expired {
            self.unlink(task_id, &entry);
            debug!(task_id = %task_id, "Task expired on access");
            return Err(TaskStorageError::TaskNotFound(task_id.to_string()));
        }
        Ok(entry)
    }

    /// Drop `entry` from the map unless it has already been replaced.
    fn unlink(&self, task_id: &str, entry: &Arc<TaskEntry>) {
        let mut tasks = self.tasks.write();
        if tasks.get(task_id).is_some_and(|e| Arc::ptr_eq(e, entry)) {
            tasks.remove(task_id);
        }
    }

    fn snapshot<F>(&self, filter: F) -> Vec<TaskRecord>
    where
        F: Fn(&TaskRecord) -> bool,
    {
        let entries: Vec<Arc<TaskEntry>> = self.tasks.read().values().cloned().collect();
        let now = Utc::now();
        entries
            .iter()
            .filter_map(|entry| {
                let state = entry.state.lock();
                let visible = !state.removed
                    && !state.record.is_expired(self.config.ttl_policy, now)
                    && filter(&state.record);
                visible.then(|| state.record.clone())
            })
            .collect()
    }

    fn paginate(
        &self,
        mut records: Vec<TaskRecord>,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> TaskListPage {
        let limit = limit.unwrap_or(self.config.default_page_size).max(1) as usize;

        // Sort by (created_at, task_id) for deterministic ordering
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        // Unknown cursors restart from the beginning
        let start = cursor
            .and_then(|id| records.iter().position(|t| t.task_id == id))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        let total = records.len();
        let tasks: Vec<TaskRecord> = records.into_iter().skip(start).take(limit).collect();
        let next_cursor = if start + limit < total {
            tasks.last().map(|t| t.task_id.clone())
        } else {
            None
        };

        TaskListPage { tasks, next_cursor }
    }
}

impl Default for InMemoryTaskStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStorage for InMemoryTaskStorage {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_task(&self, task: TaskRecord) -> Result<TaskRecord, TaskStorageError> {
        let mut tasks = self.tasks.write();

        if tasks.contains_key(&task.task_id) {
            return Err(TaskStorageError::DuplicateTask(task.task_id));
        }
        if self.config.max_tasks > 0 && tasks.len() >= self.config.max_tasks {
            return Err(TaskStorageError::MaxTasksReached(self.config.max_tasks));
        }

        debug!(task_id = %task.task_id, method = %task.original_method, "Task created");
        tasks.insert(task.task_id.clone(), Arc::new(TaskEntry::new(task.clone())));
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, TaskStorageError> {
        match self.live_entry(task_id) {
            Ok(entry) => Ok(entry.lock_live(task_id).ok().map(|s| s.record.clone())),
            Err(TaskStorageError::TaskNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_task(&self, task_id: &str) -> Result<bool, TaskStorageError> {
        let removed = self.tasks.write().remove(task_id);
        match removed {
            Some(entry) => {
                let mut state = entry.state.lock();
                entry.retire(&mut state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_tasks(
        &self,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TaskListPage, TaskStorageError> {
        let records = self.snapshot(|_| true);
        Ok(self.paginate(records, cursor, limit))
    }

    async fn list_tasks_for_session(
        &self,
        session_id: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TaskListPage, TaskStorageError> {
        let records = self.snapshot(|t| t.visible_to(Some(session_id)));
        Ok(self.paginate(records, cursor, limit))
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        status_message: Option<String>,
    ) -> Result<TaskRecord, TaskStorageError> {
        let entry = self.live_entry(task_id)?;
        let mut state = entry.lock_live(task_id)?;

        state_machine::validate_transition(state.record.status, new_status)?;

        if state_machine::is_terminal(new_status) {
            entry.finish(&mut state, new_status, status_message, None);
        } else {
            state.record.status = new_status;
            state.record.status_message = status_message;
            state.record.last_updated_at = Utc::now();
        }
        debug!(task_id = %task_id, status = %new_status, "Task status updated");
        Ok(state.record.clone())
    }

    async fn complete_task(
        &self,
        task_id: &str,
        outcome: TaskOutcome,
        status_message: Option<String>,
    ) -> Result<Option<TaskRecord>, TaskStorageError> {
        let entry = self.live_entry(task_id)?;
        let mut state = entry.lock_live(task_id)?;

        if state.record.is_terminal() {
            debug!(
                task_id = %task_id,
                status = %state.record.status,
                "Ignoring completion of terminal task"
            );
            return Ok(None);
        }

        let (status, message) = match &outcome {
            TaskOutcome::Success(_) => (TaskStatus::Completed, status_message),
            TaskOutcome::Error { message, .. } => (
                TaskStatus::Failed,
                status_message.or_else(|| Some(message.clone())),
            ),
        };
        entry.finish(&mut state, status, message, Some(outcome));
        debug!(task_id = %task_id, status = %status, "Task completed");
        Ok(Some(state.record.clone()))
    }

    async fn cancel_task(
        &self,
        task_id: &str,
        reason: Option<String>,
    ) -> Result<TaskRecord, TaskStorageError> {
        let entry = self.live_entry(task_id)?;
        let mut state = entry.lock_live(task_id)?;

        state_machine::validate_transition(state.record.status, TaskStatus::Cancelled)?;
        entry.finish(&mut state, TaskStatus::Cancelled, reason, None);
        debug!(task_id = %task_id, "Task cancelled");
        Ok(state.record.clone())
    }

    async fn get_task_result(
        &self,
        task_id: &str,
    ) -> Result<Option<TaskOutcome>, TaskStorageError> {
        let entry = self.live_entry(task_id)?;
        let state = entry.lock_live(task_id)?;
        Ok(state.record.result.clone())
    }

    async fn wait_for_terminal(&self, task_id: &str) -> Result<TaskRecord, TaskStorageError> {
        let entry = self.live_entry(task_id)?;
        let mut done = entry.done.subscribe();

        // `wait_for` inspects the current value first, so a task that finished
        // before we subscribed returns immediately.
        done.wait_for(|finished| *finished)
            .await
            .map_err(|_| TaskStorageError::Generic("completion signal dropped".to_string()))?;

        let state = entry.lock_live(task_id)?;
        Ok(state.record.clone())
    }

    async fn expire_tasks(&self) -> Result<Vec<String>, TaskStorageError> {
        let now = Utc::now();
        let policy = self.config.ttl_policy;
        let mut tasks = self.tasks.write();
        let mut expired = Vec::new();

        tasks.retain(|task_id, entry| {
            let mut state = entry.state.lock();
            if state.removed || state.record.is_expired(policy, now) {
                entry.retire(&mut state);
                expired.push(task_id.clone());
                false
            } else {
                true
            }
        });

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired tasks removed");
        }
        Ok(expired)
    }

    async fn task_count(&self) -> Result<usize, TaskStorageError> {
        Ok(self.tasks.read().len())
    }

    async fn maintenance(&self) -> Result<(), TaskStorageError> {
        self.expire_tasks().await?;
        Ok(())
    }
}
