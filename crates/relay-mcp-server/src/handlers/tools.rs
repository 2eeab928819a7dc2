//! `tools/list` and `tools/call`, including task-augmented calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error};

use relay_mcp_protocol::tools::ListToolsResult;
use relay_mcp_protocol::{
    CallToolParams, CallToolResult, CreateTaskResult, McpError, McpResult, TaskMetadata,
    TaskSupport, methods,
};
use relay_mcp_task_storage::{MAX_TTL_MS, TaskOutcome, is_valid_ttl};

use super::{McpHandler, parse_params};
use crate::session::SessionContext;
use crate::task::{TaskBody, TaskRuntime};
use crate::tool::{McpTool, ToolContext, ToolMap};

/// Lists registered tools, sorted by name.
pub struct ListToolsHandler {
    tools: Arc<ToolMap>,
}

impl ListToolsHandler {
    pub fn new(tools: Arc<ToolMap>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl McpHandler for ListToolsHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        let mut tools: Vec<_> = self.tools.values().map(|tool| tool.to_tool()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TOOLS_LIST.to_string()]
    }
}

/// Runs a tool inline, or as a task when the request carries `task`.
pub struct CallToolHandler {
    tools: Arc<ToolMap>,
    runtime: Option<Arc<TaskRuntime>>,
    task_calls: bool,
}

impl CallToolHandler {
    /// A handler that only runs tools inline.
    pub fn new(tools: Arc<ToolMap>) -> Self {
        Self {
            tools,
            runtime: None,
            task_calls: false,
        }
    }

    /// Accept task-augmented calls, running them on `runtime`.
    pub fn with_task_runtime(mut self, runtime: Arc<TaskRuntime>) -> Self {
        self.runtime = Some(runtime);
        self.task_calls = true;
        self
    }

    fn resolve(&self, params: &CallToolParams) -> McpResult<Arc<dyn McpTool>> {
        let tool = self
            .tools
            .get(&params.name)
            .cloned()
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        match (tool.task_support(), params.task.is_some()) {
            (TaskSupport::Required, false) => Err(McpError::invalid_params(format!(
                "Tool '{}' must be invoked as a task",
                params.name
            ))),
            (TaskSupport::Forbidden, true) => Err(McpError::invalid_params(format!(
                "Tool '{}' does not support task invocation",
                params.name
            ))),
            (_, true) if !self.task_calls => Err(McpError::invalid_params(
                "Task-augmented tool calls are not enabled on this server",
            )),
            _ => Ok(tool),
        }
    }

    async fn call_inline(
        &self,
        tool: Arc<dyn McpTool>,
        args: Value,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let cancellation = session
            .as_ref()
            .and_then(SessionContext::request_cancellation)
            .cloned()
            .unwrap_or_default();
        let ctx = ToolContext::new(session, cancellation);
        let result = match tool.call(args, ctx).await {
            Ok(result) => result,
            Err(err) => {
                error!(tool = %tool.name(), error = %err, "Tool execution error");
                CallToolResult::error_text(format!("Error: {}", err))
            }
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn call_as_task(
        &self,
        runtime: &Arc<TaskRuntime>,
        tool: Arc<dyn McpTool>,
        params: CallToolParams,
        metadata: TaskMetadata,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        if let Some(ttl) = metadata.ttl
            && !is_valid_ttl(ttl)
        {
            return Err(McpError::invalid_params(format!(
                "task.ttl must be between 1 and {} ms, got {}",
                MAX_TTL_MS, ttl
            )));
        }

        let session_id = session.as_ref().map(|s| s.session_id().to_string());
        let record = runtime
            .new_record(methods::TOOLS_CALL, session_id.as_deref(), &metadata)
            .with_params(serde_json::to_value(&params)?);

        let args = params.arguments.unwrap_or_else(|| json!({}));
        let body_runtime = Arc::clone(runtime);
        let body: TaskBody = Box::new(move |task_id, cancellation| {
            Box::pin(async move {
                let ctx = ToolContext::for_task(session, task_id, body_runtime, cancellation);
                match tool.call(args, ctx).await {
                    Ok(result) => match serde_json::to_value(result) {
                        Ok(value) => TaskOutcome::Success(value),
                        Err(err) => outcome_from_error(&McpError::from(err)),
                    },
                    Err(err) => {
                        debug!(tool = %tool.name(), error = %err, "Task body failed");
                        outcome_from_error(&err)
                    }
                }
            })
        });

        let created = runtime.spawn_task(record, body).await?;
        let result = CreateTaskResult::new(created.to_protocol_task());
        Ok(serde_json::to_value(result)?)
    }
}

fn outcome_from_error(err: &McpError) -> TaskOutcome {
    let obj = err.to_error_object();
    TaskOutcome::Error {
        code: obj.code,
        message: obj.message,
        data: obj.data,
    }
}

#[async_trait]
impl McpHandler for CallToolHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        self.handle_with_session(params, None).await
    }

    async fn handle_with_session(
        &self,
        params: Option<Value>,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let mut params: CallToolParams = parse_params(params)?;
        let tool = self.resolve(&params)?;

        match (params.task.take(), &self.runtime) {
            (Some(metadata), Some(runtime)) => {
                self.call_as_task(runtime, tool, params, metadata, session)
                    .await
            }
            (Some(_), None) => Err(McpError::invalid_params(
                "Task-augmented tool calls are not enabled on this server",
            )),
            (None, _) => {
                let args = params.arguments.unwrap_or_else(|| json!({}));
                self.call_inline(tool, args, session).await
            }
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TOOLS_CALL.to_string()]
    }
}
