//! Task Handlers: MCP request handlers for tasks/get, tasks/list, tasks/cancel, tasks/result.
//!
//! These handlers implement the `McpHandler` trait and delegate to `TaskRuntime`
//! for storage and runtime coordination. A caller bound to a session only
//! ever sees its own tasks; anything else is reported as not found.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use relay_mcp_protocol::error_codes::REQUEST_CANCELLED;
use relay_mcp_protocol::meta::inject_related_task;
use relay_mcp_protocol::tasks::{CancelTaskParams, GetTaskParams, GetTaskPayloadParams};
use relay_mcp_protocol::{
    CancelTaskResult, Cursor, GetTaskResult, ListTasksParams, ListTasksResult, McpError,
    McpResult, Task, TaskStatus, methods,
};
use relay_mcp_task_storage::TaskOutcome;

use crate::handlers::{McpHandler, parse_params};
use crate::session::SessionContext;
use crate::task::TaskRuntime;

fn session_id(session: &Option<SessionContext>) -> Option<&str> {
    session.as_ref().map(|s| s.session_id())
}

// === tasks/get ===

/// Handler for `tasks/get`: retrieves a task's current status.
pub struct TasksGetHandler {
    runtime: Arc<TaskRuntime>,
}

impl TasksGetHandler {
    pub fn new(runtime: Arc<TaskRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl McpHandler for TasksGetHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        self.handle_with_session(params, None).await
    }

    async fn handle_with_session(
        &self,
        params: Option<Value>,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let get_params: GetTaskParams = parse_params(params)?;
        debug!(task_id = %get_params.task_id, "tasks/get request");

        let record = self
            .runtime
            .get_task(&get_params.task_id, session_id(&session))
            .await?;
        let result = GetTaskResult::new(record.to_protocol_task());
        Ok(serde_json::to_value(result)?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TASKS_GET.to_string()]
    }
}

// === tasks/list ===

/// Handler for `tasks/list`: lists tasks with cursor-based pagination.
pub struct TasksListHandler {
    runtime: Arc<TaskRuntime>,
}

impl TasksListHandler {
    pub fn new(runtime: Arc<TaskRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl McpHandler for TasksListHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        self.handle_with_session(params, None).await
    }

    async fn handle_with_session(
        &self,
        params: Option<Value>,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let list_params: ListTasksParams = parse_params(params)?;
        let cursor = list_params.cursor.as_ref().map(Cursor::as_str);
        debug!(cursor = ?cursor, limit = ?list_params.limit, "tasks/list request");

        let page = self
            .runtime
            .list_tasks(session_id(&session), cursor, list_params.limit)
            .await?;

        let tasks: Vec<Task> = page.tasks.iter().map(|r| r.to_protocol_task()).collect();
        let next_cursor = page.next_cursor.map(Cursor::from);
        let result = ListTasksResult::new(tasks).with_next_cursor(next_cursor);
        Ok(serde_json::to_value(result)?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TASKS_LIST.to_string()]
    }
}

// === tasks/cancel ===

/// Handler for `tasks/cancel`: cancels an in-flight task.
pub struct TasksCancelHandler {
    runtime: Arc<TaskRuntime>,
}

impl TasksCancelHandler {
    pub fn new(runtime: Arc<TaskRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl McpHandler for TasksCancelHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        self.handle_with_session(params, None).await
    }

    async fn handle_with_session(
        &self,
        params: Option<Value>,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let cancel_params: CancelTaskParams = parse_params(params)?;
        debug!(task_id = %cancel_params.task_id, "tasks/cancel request");

        let record = self
            .runtime
            .cancel_task(&cancel_params.task_id, session_id(&session), None)
            .await?;
        let result = CancelTaskResult::new(record.to_protocol_task());
        Ok(serde_json::to_value(result)?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TASKS_CANCEL.to_string()]
    }
}

// === tasks/result ===

/// Handler for `tasks/result`: blocks until the task is terminal, then
/// answers exactly as the original request would have.
///
/// A success value comes back with the related-task marker in `_meta`; a
/// stored error is replayed with its code, message and data intact.
pub struct TasksResultHandler {
    runtime: Arc<TaskRuntime>,
}

impl TasksResultHandler {
    pub fn new(runtime: Arc<TaskRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl McpHandler for TasksResultHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        self.handle_with_session(params, None).await
    }

    async fn handle_with_session(
        &self,
        params: Option<Value>,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let payload_params: GetTaskPayloadParams = parse_params(params)?;
        let task_id = payload_params.task_id;
        debug!(task_id = %task_id, "tasks/result request");

        let record = self
            .runtime
            .await_terminal(&task_id, session_id(&session))
            .await?;
        debug!(task_id = %task_id, status = %record.status, "Task reached terminal status");

        match record.result {
            Some(TaskOutcome::Success(mut value)) => {
                inject_related_task(&mut value, &task_id);
                Ok(value)
            }
            Some(TaskOutcome::Error {
                code,
                message,
                data,
            }) => Err(McpError::json_rpc_error(code, message, data)),
            None if record.status == TaskStatus::Cancelled => Err(McpError::json_rpc_error(
                REQUEST_CANCELLED,
                format!("Task {} was cancelled", task_id),
                record
                    .status_message
                    .map(|reason| serde_json::json!({ "reason": reason })),
            )),
            None => {
                warn!(
                    task_id = %task_id,
                    status = %record.status,
                    "Terminal task has no stored result"
                );
                Err(McpError::ToolExecutionError(
                    record
                        .status_message
                        .unwrap_or_else(|| format!("Task {} finished without a result", task_id)),
                ))
            }
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TASKS_RESULT.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationHandle;
    use crate::task::TaskBody;
    use relay_mcp_protocol::TaskMetadata;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn sleeping_body(delay: Duration, outcome: TaskOutcome) -> TaskBody {
        Box::new(move |_id, _cancel: CancellationHandle| {
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                outcome
            })
        })
    }

    async fn spawn(
        runtime: &Arc<TaskRuntime>,
        session: Option<&str>,
        delay: Duration,
        outcome: TaskOutcome,
    ) -> String {
        let record = runtime.new_record(methods::TOOLS_CALL, session, &TaskMetadata::new());
        runtime
            .spawn_task(record, sleeping_body(delay, outcome))
            .await
            .unwrap()
            .task_id
    }

    #[tokio::test]
    async fn test_get_reports_working() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let id = spawn(
            &runtime,
            None,
            Duration::from_secs(5),
            TaskOutcome::Success(json!({})),
        )
        .await;

        let result = TasksGetHandler::new(runtime)
            .handle(Some(json!({"taskId": id})))
            .await
            .unwrap();
        assert_eq!(result["taskId"], id);
        assert_eq!(result["status"], "working");
    }

    #[tokio::test]
    async fn test_get_unknown_is_invalid_params() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let err = TasksGetHandler::new(runtime)
            .handle(Some(json!({"taskId": "missing"})))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::TaskNotFound(_)));
        assert_eq!(err.to_error_object().code, -32602);
    }

    #[tokio::test]
    async fn test_result_blocks_until_terminal() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let delay = Duration::from_millis(100);
        let id = spawn(
            &runtime,
            None,
            delay,
            TaskOutcome::Success(json!({"content": [{"type": "text", "text": "done"}]})),
        )
        .await;

        let start = Instant::now();
        let result = TasksResultHandler::new(runtime)
            .handle(Some(json!({"taskId": id})))
            .await
            .unwrap();
        assert!(start.elapsed() >= delay);
        assert_eq!(result["content"][0]["text"], "done");
        assert_eq!(
            result["_meta"]["io.modelcontextprotocol/related-task"]["taskId"],
            id
        );
    }

    #[tokio::test]
    async fn test_result_replays_stored_error() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let id = spawn(
            &runtime,
            None,
            Duration::from_millis(5),
            TaskOutcome::Error {
                code: -32010,
                message: "disk full".to_string(),
                data: Some(json!({"path": "/tmp"})),
            },
        )
        .await;

        let err = TasksResultHandler::new(runtime)
            .handle(Some(json!({"taskId": id})))
            .await
            .unwrap_err();
        let obj = err.to_error_object();
        assert_eq!(obj.code, -32010);
        assert_eq!(obj.message, "disk full");
        assert_eq!(obj.data, Some(json!({"path": "/tmp"})));
    }

    #[tokio::test]
    async fn test_result_of_cancelled_task() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let id = spawn(
            &runtime,
            None,
            Duration::from_secs(10),
            TaskOutcome::Success(json!({})),
        )
        .await;

        let waiter = {
            let handler = TasksResultHandler::new(runtime.clone());
            let params = Some(json!({"taskId": id}));
            tokio::spawn(async move { handler.handle(params).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancelled = TasksCancelHandler::new(runtime.clone())
            .handle(Some(json!({"taskId": id})))
            .await
            .unwrap();
        assert_eq!(cancelled["status"], "cancelled");

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.to_error_object().code, REQUEST_CANCELLED);
    }

    #[tokio::test]
    async fn test_cancel_twice() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let id = spawn(
            &runtime,
            None,
            Duration::from_secs(10),
            TaskOutcome::Success(json!({})),
        )
        .await;
        let handler = TasksCancelHandler::new(runtime);

        handler.handle(Some(json!({"taskId": id}))).await.unwrap();
        let err = handler
            .handle(Some(json!({"taskId": id})))
            .await
            .unwrap_err();
        assert_eq!(err.to_error_object().code, -32602);
    }

    #[tokio::test]
    async fn test_list_pages_through_everything() {
        let runtime = Arc::new(TaskRuntime::in_memory());
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(
                spawn(
                    &runtime,
                    None,
                    Duration::from_secs(10),
                    TaskOutcome::Success(json!({})),
                )
                .await,
            );
        }

        let handler = TasksListHandler::new(runtime);
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = json!({"limit": 2});
            if let Some(c) = &cursor {
                params["cursor"] = json!(c);
            }
            let page = handler.handle(Some(params)).await.unwrap();
            for task in page["tasks"].as_array().unwrap() {
                seen.push(task["taskId"].as_str().unwrap().to_string());
            }
            match page.get("nextCursor").and_then(|c| c.as_str()) {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        seen.sort();
        created.sort();
        assert_eq!(seen, created);
    }
}
