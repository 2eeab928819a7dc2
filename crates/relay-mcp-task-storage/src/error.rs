//! Error type for task storage operations.

use relay_mcp_protocol::TaskStatus;

#[derive(Debug, thiserror::Error)]
pub enum TaskStorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Invalid state transition: {current} -> {requested}")]
    InvalidTransition {
        current: TaskStatus,
        requested: TaskStatus,
    },

    #[error("Task is in terminal state: {0}")]
    TerminalState(TaskStatus),

    #[error("Maximum tasks limit reached: {0}")]
    MaxTasksReached(usize),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Generic storage error: {0}")]
    Generic(String),
}

impl From<serde_json::Error> for TaskStorageError {
    fn from(err: serde_json::Error) -> Self {
        TaskStorageError::SerializationError(err.to_string())
    }
}
