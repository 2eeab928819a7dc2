//! MCP Tasks Protocol Types
//!
//! Tasks are created implicitly when a `tools/call` carries a `task` object in
//! its params. There is no `tasks/create` method; the client receives a
//! [`CreateTaskResult`] and then polls with `tasks/get`, waits with
//! `tasks/result` or aborts with `tasks/cancel`.
//!
//! ```text
//! Working -> Completed       (success)
//! Working -> Failed          (error)
//! Working -> Cancelled       (client or server cancellation)
//! Working <-> InputRequired  (handler-driven)
//! ```
//!
//! ```rust
//! use relay_mcp_protocol::tasks::*;
//!
//! let task = Task::new("task-abc-123", TaskStatus::Working,
//!     "2025-01-01T00:00:00.000Z", "2025-01-01T00:00:00.000Z")
//!     .with_ttl(60_000)
//!     .with_poll_interval(1_000);
//!
//! assert_eq!(task.status, TaskStatus::Working);
//! assert_eq!(task.ttl, Some(60_000));
//! ```

use crate::meta::{Cursor, Meta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status. `InputRequired` travels as `input_required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Working,
    InputRequired,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Working => "working",
            TaskStatus::InputRequired => "input_required",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Task options attached to a task-augmented request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    /// Time-to-live in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    /// Suggested poll interval in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

impl TaskMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_poll_interval(mut self, interval: u64) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Wire snapshot of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 time of the last status change
    pub last_updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Time-to-live in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    /// Suggested poll interval in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Task {
    pub fn new(
        task_id: impl Into<String>,
        status: TaskStatus,
        created_at: impl Into<String>,
        last_updated_at: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            created_at: created_at.into(),
            last_updated_at: last_updated_at.into(),
            status_message: None,
            ttl: None,
            poll_interval: None,
            meta: None,
        }
    }

    pub fn with_status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_poll_interval(mut self, interval: u64) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Params shared by `tasks/get`, `tasks/cancel` and `tasks/result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdParams {
    pub task_id: String,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl TaskIdParams {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            meta: None,
        }
    }
}

pub type GetTaskParams = TaskIdParams;
pub type CancelTaskParams = TaskIdParams;
pub type GetTaskPayloadParams = TaskIdParams;

/// Result for tasks/get; the task is flattened into the result object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskResult {
    #[serde(flatten)]
    pub task: Task,
}

impl GetTaskResult {
    pub fn new(task: Task) -> Self {
        Self { task }
    }
}

/// Result for tasks/cancel; the task is flattened into the result object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResult {
    #[serde(flatten)]
    pub task: Task,
}

impl CancelTaskResult {
    pub fn new(task: Task) -> Self {
        Self { task }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ListTasksParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksResult {
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

impl ListTasksResult {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            next_cursor: None,
        }
    }

    pub fn with_next_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.next_cursor = cursor;
        self
    }
}

/// Returned instead of the operation's result when a request is task-augmented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResult {
    pub task: Task,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl CreateTaskResult {
    pub fn new(task: Task) -> Self {
        Self { task, meta: None }
    }
}

/// Params of `notifications/tasks/status`: the task snapshot, flattened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusNotificationParams {
    #[serde(flatten)]
    pub task: Task,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMESTAMP: &str = "2025-01-01T00:00:00.000Z";

    #[test]
    fn test_task_status_serialization() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InputRequired).unwrap(),
            json!("input_required")
        );
        assert_eq!(
            serde_json::to_value(TaskStatus::Cancelled).unwrap(),
            json!("cancelled")
        );
        let parsed: TaskStatus = serde_json::from_value(json!("working")).unwrap();
        assert_eq!(parsed, TaskStatus::Working);
        assert_eq!(TaskStatus::InputRequired.to_string(), "input_required");
    }

    #[test]
    fn test_task_camel_case_fields() {
        let task = Task::new("t-1", TaskStatus::Working, TIMESTAMP, TIMESTAMP)
            .with_ttl(60_000)
            .with_poll_interval(1_000);
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["taskId"], "t-1");
        assert_eq!(value["createdAt"], TIMESTAMP);
        assert_eq!(value["lastUpdatedAt"], TIMESTAMP);
        assert_eq!(value["ttl"], 60_000);
        assert_eq!(value["pollInterval"], 1_000);
        assert!(value.get("statusMessage").is_none());
        assert!(value.get("_meta").is_none());
    }

    #[test]
    fn test_get_task_result_is_flattened() {
        let result = GetTaskResult::new(
            Task::new("t-2", TaskStatus::Failed, TIMESTAMP, TIMESTAMP).with_status_message("boom"),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["taskId"], "t-2");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["statusMessage"], "boom");
        assert!(value.get("task").is_none());
    }

    #[test]
    fn test_create_task_result_nests_task() {
        let task = Task::new("t-3", TaskStatus::Working, TIMESTAMP, TIMESTAMP);
        let result = CreateTaskResult::new(task);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["task"]["taskId"], "t-3");
        assert_eq!(value["task"]["status"], "working");
    }

    #[test]
    fn test_task_metadata_from_tool_call() {
        let meta: TaskMetadata =
            serde_json::from_value(json!({"ttl": 100, "pollInterval": 50})).unwrap();
        assert_eq!(meta.ttl, Some(100));
        assert_eq!(meta.poll_interval, Some(50));

        let empty: TaskMetadata = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, TaskMetadata::default());
    }

    #[test]
    fn test_list_params_with_cursor() {
        let params: ListTasksParams =
            serde_json::from_value(json!({"cursor": "t-5", "limit": 2})).unwrap();
        assert_eq!(params.cursor, Some(Cursor::new("t-5")));
        assert_eq!(params.limit, Some(2));

        let params: ListTasksParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.cursor.is_none());
    }
}
