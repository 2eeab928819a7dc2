//! Task observability hooks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_mcp_protocol::TaskStatus;
use relay_mcp_task_storage::{TaskOutcome, TaskRecord};

/// What a hook sees about a task.
#[derive(Debug, Clone)]
pub struct TaskMetrics {
    pub task_id: String,
    pub tool_name: String,
    pub session_id: Option<String>,
    pub status: TaskStatus,
    /// Time since creation
    pub duration: Duration,
    /// Error message of a failed task
    pub error: Option<String>,
}

impl TaskMetrics {
    pub fn from_record(record: &TaskRecord) -> Self {
        let tool_name = record
            .original_params
            .as_ref()
            .and_then(|params| params.get("name"))
            .and_then(|name| name.as_str())
            .unwrap_or(record.original_method.as_str())
            .to_string();
        let error = match &record.result {
            Some(TaskOutcome::Error { message, .. }) => Some(message.clone()),
            _ if record.status == TaskStatus::Failed => record.status_message.clone(),
            _ => None,
        };

        Self {
            task_id: record.task_id.clone(),
            tool_name,
            session_id: record.session_id.clone(),
            status: record.status,
            duration: (Utc::now() - record.created_at).to_std().unwrap_or_default(),
            error,
        }
    }
}

pub type TaskHook = Arc<dyn Fn(&TaskMetrics) + Send + Sync>;

/// Callback lists run after task state transitions.
///
/// Hooks run synchronously on the execution unit that made the transition;
/// keep them short.
#[derive(Clone, Default)]
pub struct TaskHooks {
    on_created: Vec<TaskHook>,
    on_completed: Vec<TaskHook>,
    on_failed: Vec<TaskHook>,
    on_cancelled: Vec<TaskHook>,
}

impl TaskHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_on_task_created<F>(&mut self, hook: F)
    where
        F: Fn(&TaskMetrics) + Send + Sync + 'static,
    {
        self.on_created.push(Arc::new(hook));
    }

    pub fn add_on_task_completed<F>(&mut self, hook: F)
    where
        F: Fn(&TaskMetrics) + Send + Sync + 'static,
    {
        self.on_completed.push(Arc::new(hook));
    }

    pub fn add_on_task_failed<F>(&mut self, hook: F)
    where
        F: Fn(&TaskMetrics) + Send + Sync + 'static,
    {
        self.on_failed.push(Arc::new(hook));
    }

    pub fn add_on_task_cancelled<F>(&mut self, hook: F)
    where
        F: Fn(&TaskMetrics) + Send + Sync + 'static,
    {
        self.on_cancelled.push(Arc::new(hook));
    }

    pub(crate) fn task_created(&self, record: &TaskRecord) {
        Self::fire(&self.on_created, record);
    }

    /// Fire the list matching the record's terminal status.
    pub(crate) fn task_finished(&self, record: &TaskRecord) {
        let hooks = match record.status {
            TaskStatus::Completed => &self.on_completed,
            TaskStatus::Failed => &self.on_failed,
            TaskStatus::Cancelled => &self.on_cancelled,
            TaskStatus::Working | TaskStatus::InputRequired => return,
        };
        Self::fire(hooks, record);
    }

    fn fire(hooks: &[TaskHook], record: &TaskRecord) {
        if hooks.is_empty() {
            return;
        }
        let metrics = TaskMetrics::from_record(record);
        for hook in hooks {
            hook(&metrics);
        }
    }
}

impl fmt::Debug for TaskHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHooks")
            .field("on_created", &self.on_created.len())
            .field("on_completed", &self.on_completed.len())
            .field("on_failed", &self.on_failed.len())
            .field("on_cancelled", &self.on_cancelled.len())
            .finish()
    }
}
