//! Task support: execution, limiting, observability and the `tasks/*` methods.

pub mod executor;
pub mod handlers;
pub mod hooks;
pub mod runtime;
pub mod tokio_executor;

pub use executor::{BoxedTaskWork, TaskExecutor, TaskHandle};
pub use handlers::{TasksCancelHandler, TasksGetHandler, TasksListHandler, TasksResultHandler};
pub use hooks::{TaskHook, TaskHooks, TaskMetrics};
pub use runtime::{TaskBody, TaskDefaults, TaskRuntime};
pub use tokio_executor::TokioTaskExecutor;

use relay_mcp_protocol::McpError;
use relay_mcp_task_storage::TaskStorageError;

/// Map a storage failure onto the protocol error a client sees.
pub fn map_storage_error(err: TaskStorageError) -> McpError {
    match err {
        TaskStorageError::TaskNotFound(id) => McpError::TaskNotFound(id),
        TaskStorageError::TerminalState(status) => McpError::InvalidParameters(format!(
            "Task is already in terminal state: {}",
            status
        )),
        TaskStorageError::InvalidTransition { current, requested } => McpError::InvalidParameters(
            format!("Invalid task transition: {} -> {}", current, requested),
        ),
        TaskStorageError::MaxTasksReached(limit) => {
            McpError::ResourceExhausted(format!("maximum of {} stored tasks reached", limit))
        }
        other => McpError::json_rpc_error(
            relay_mcp_json_rpc_server::error_codes::INTERNAL_ERROR,
            other.to_string(),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_mcp_protocol::TaskStatus;

    #[test]
    fn test_storage_error_mapping() {
        assert!(matches!(
            map_storage_error(TaskStorageError::TaskNotFound("t".into())),
            McpError::TaskNotFound(_)
        ));
        assert!(matches!(
            map_storage_error(TaskStorageError::TerminalState(TaskStatus::Completed)),
            McpError::InvalidParameters(_)
        ));
        assert!(matches!(
            map_storage_error(TaskStorageError::MaxTasksReached(3)),
            McpError::ResourceExhausted(_)
        ));
        let internal = map_storage_error(TaskStorageError::DuplicateTask("t".into()));
        assert_eq!(internal.to_error_object().code, -32603);
    }
}
