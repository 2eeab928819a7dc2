//! Core task storage trait and data models.

use crate::error::TaskStorageError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use relay_mcp_protocol::{Meta, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of a task's underlying request.
///
/// `tasks/result` returns a `Success` value as the response result and replays
/// an `Error` as the same JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// The result object, e.g. a serialized `CallToolResult`
    Success(Value),
    Error {
        code: i64,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Longest TTL a task may request: one year.
pub const MAX_TTL_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Whether `ttl` is a usable TTL in milliseconds.
pub fn is_valid_ttl(ttl: i64) -> bool {
    (1..=MAX_TTL_MS).contains(&ttl)
}

/// Clock origin for a task's TTL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtlPolicy {
    /// `createdAt + ttl`, regardless of status
    #[default]
    FromCreation,
    /// `terminal transition + ttl`; running tasks never expire
    FromTerminal,
}

/// Persistence model for a task.
///
/// Runtime handles (cancellation, completion signal) live beside the record,
/// never inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// UUID v7, so ids sort by creation
    pub task_id: String,
    /// Session the task is bound to; `None` is visible to every session
    pub session_id: Option<String>,
    pub status: TaskStatus,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// When the task reached a terminal status
    pub terminal_at: Option<DateTime<Utc>>,
    /// Time-to-live in milliseconds
    pub ttl: Option<i64>,
    /// Suggested polling interval in milliseconds
    pub poll_interval: Option<u64>,
    /// The method that created this task (e.g., "tools/call")
    pub original_method: String,
    pub original_params: Option<Value>,
    /// Set exactly once, on the terminal transition that wins
    pub result: Option<TaskOutcome>,
    pub meta: Option<Meta>,
}

impl TaskRecord {
    /// A fresh `working` record stamped with the current time.
    pub fn new(task_id: impl Into<String>, original_method: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            session_id: None,
            status: TaskStatus::Working,
            status_message: None,
            created_at: now,
            last_updated_at: now,
            terminal_at: None,
            ttl: None,
            poll_interval: None,
            original_method: original_method.into(),
            original_params: None,
            result: None,
            meta: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Option<i64>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Option<u64>) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.original_params = Some(params);
        self
    }

    pub fn is_terminal(&self) -> bool {
        crate::state_machine::is_terminal(self.status)
    }

    /// Moment after which the task may be swept, if any.
    ///
    /// A TTL that overflows the calendar never expires.
    pub fn expires_at(&self, policy: TtlPolicy) -> Option<DateTime<Utc>> {
        let ttl = TimeDelta::try_milliseconds(self.ttl?)?;
        let origin = match policy {
            TtlPolicy::FromCreation => self.created_at,
            TtlPolicy::FromTerminal => self.terminal_at?,
        };
        origin.checked_add_signed(ttl)
    }

    pub fn is_expired(&self, policy: TtlPolicy, now: DateTime<Utc>) -> bool {
        self.expires_at(policy).is_some_and(|at| now > at)
    }

    /// Whether `session_id` may see this task.
    pub fn visible_to(&self, session_id: Option<&str>) -> bool {
        match (&self.session_id, session_id) {
            (None, _) => true,
            (Some(owner), Some(caller)) => owner == caller,
            (Some(_), None) => false,
        }
    }

    /// Convert this record to a protocol `Task` for wire transmission.
    pub fn to_protocol_task(&self) -> Task {
        let mut task = Task::new(
            &self.task_id,
            self.status,
            format_timestamp(self.created_at),
            format_timestamp(self.last_updated_at),
        );
        if let Some(ref msg) = self.status_message {
            task = task.with_status_message(msg);
        }
        if let Some(ttl) = self.ttl {
            task = task.with_ttl(ttl);
        }
        if let Some(interval) = self.poll_interval {
            task = task.with_poll_interval(interval);
        }
        task.meta = self.meta.clone();
        task
    }
}

/// RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Paginated result for task listing.
#[derive(Debug, Clone)]
pub struct TaskListPage {
    pub tasks: Vec<TaskRecord>,
    /// Cursor for the next page (None if this is the last page)
    pub next_cursor: Option<String>,
}

/// Core trait for task storage backends.
///
/// Every terminal transition goes through exactly one winner per task:
/// `complete_task`, `cancel_task` and `update_task_status` all check the
/// current status and write under the same per-task exclusion, and the
/// winner wakes every `wait_for_terminal` caller.
#[async_trait]
pub trait TaskStorage: Send + Sync {
    fn backend_name(&self) -> &'static str;

    // === Task CRUD ===

    /// Insert a new record. Fails with `DuplicateTask` on id collision and
    /// `MaxTasksReached` when the store is full.
    async fn create_task(&self, task: TaskRecord) -> Result<TaskRecord, TaskStorageError>;

    /// Get a task by ID. Expired tasks are removed and reported as `None`.
    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, TaskStorageError>;

    /// Returns `true` if deleted, `false` if not found.
    async fn delete_task(&self, task_id: &str) -> Result<bool, TaskStorageError>;

    // === Listing (paginated, ordered by (created_at, task_id)) ===

    async fn list_tasks(
        &self,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TaskListPage, TaskStorageError>;

    /// Tasks visible to `session_id`: its own plus unbound ones.
    async fn list_tasks_for_session(
        &self,
        session_id: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TaskListPage, TaskStorageError>;

    // === Transitions ===

    /// Validated status change. A terminal target wakes waiters.
    async fn update_task_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        status_message: Option<String>,
    ) -> Result<TaskRecord, TaskStorageError>;

    /// Record the outcome: `Completed` for `Success`, `Failed` for `Error`.
    ///
    /// First write wins. Returns `Ok(None)` without touching the record when
    /// the task is already terminal.
    async fn complete_task(
        &self,
        task_id: &str,
        outcome: TaskOutcome,
        status_message: Option<String>,
    ) -> Result<Option<TaskRecord>, TaskStorageError>;

    /// Transition to `Cancelled`. Fails with `TerminalState` when the task
    /// already finished.
    async fn cancel_task(
        &self,
        task_id: &str,
        reason: Option<String>,
    ) -> Result<TaskRecord, TaskStorageError>;

    async fn get_task_result(&self, task_id: &str)
    -> Result<Option<TaskOutcome>, TaskStorageError>;

    /// Suspend until the task is terminal, then return its record.
    ///
    /// Dropping the future abandons the wait without touching the task.
    /// Fails with `TaskNotFound` if the task is missing or is swept while
    /// waiting.
    async fn wait_for_terminal(&self, task_id: &str) -> Result<TaskRecord, TaskStorageError>;

    // === Cleanup ===

    /// Remove tasks past their TTL. Returns IDs of expired tasks.
    async fn expire_tasks(&self) -> Result<Vec<String>, TaskStorageError>;

    async fn task_count(&self) -> Result<usize, TaskStorageError>;

    /// Perform periodic maintenance (expiry for now)
    async fn maintenance(&self) -> Result<(), TaskStorageError>;
}
