//! MCP Tool Trait
//!
//! The minimal seam between the server and tool implementations: a name, a
//! task-support declaration and an async `call`. Tools reach the client and
//! their own task through [`ToolContext`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use relay_mcp_protocol::tools::ToolExecution;
use relay_mcp_protocol::{
    CallToolResult, CreateMessageParams, CreateMessageResult, ElicitRequestParams, ElicitResult,
    ListRootsResult, McpError, McpResult, TaskStatus, TaskSupport, Tool,
};

use crate::cancellation::CancellationHandle;
use crate::session::SessionContext;
use crate::task::TaskRuntime;

/// Tools registered with a server, keyed by name.
pub type ToolMap = HashMap<String, Arc<dyn McpTool>>;

/// High-level trait for implementing MCP tools
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    /// How the tool may be invoked. Defaults to inline only.
    fn task_support(&self) -> TaskSupport {
        TaskSupport::Forbidden
    }

    /// Execute the tool.
    ///
    /// Long-running bodies should check `ctx.is_cancelled()` between units
    /// of work.
    async fn call(&self, args: Value, ctx: ToolContext) -> McpResult<CallToolResult>;

    /// Descriptor listed by `tools/list`.
    fn to_tool(&self) -> Tool {
        let task_support = self.task_support();
        Tool {
            name: self.name().to_string(),
            description: self.description().map(str::to_string),
            input_schema: self.input_schema(),
            execution: (task_support != TaskSupport::Forbidden).then_some(ToolExecution {
                task_support: Some(task_support),
            }),
        }
    }
}

#[derive(Clone)]
struct TaskScope {
    task_id: String,
    runtime: Arc<TaskRuntime>,
}

/// Everything a tool body can reach besides its arguments.
#[derive(Clone)]
pub struct ToolContext {
    session: Option<SessionContext>,
    task: Option<TaskScope>,
    cancellation: CancellationHandle,
}

impl ToolContext {
    /// Context for an inline call.
    pub fn new(session: Option<SessionContext>, cancellation: CancellationHandle) -> Self {
        Self {
            session,
            task: None,
            cancellation,
        }
    }

    pub(crate) fn for_task(
        session: Option<SessionContext>,
        task_id: String,
        runtime: Arc<TaskRuntime>,
        cancellation: CancellationHandle,
    ) -> Self {
        Self {
            session,
            task: Some(TaskScope { task_id, runtime }),
            cancellation,
        }
    }

    /// The bound session, or `NoActiveSession`.
    pub fn session(&self) -> McpResult<&SessionContext> {
        self.session.as_ref().ok_or(McpError::NoActiveSession)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id())
    }

    /// Set when the call runs as a task.
    pub fn task_id(&self) -> Option<&str> {
        self.task.as_ref().map(|t| t.task_id.as_str())
    }

    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `Err(RequestCancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> McpResult<()> {
        if self.is_cancelled() {
            Err(McpError::RequestCancelled)
        } else {
            Ok(())
        }
    }

    /// Move the task between `working` and `input_required`. A no-op for
    /// inline calls.
    pub async fn set_task_status(
        &self,
        status: TaskStatus,
        message: Option<String>,
    ) -> McpResult<()> {
        if let Some(task) = &self.task {
            task.runtime
                .update_status(&task.task_id, status, message)
                .await?;
        }
        Ok(())
    }

    /// Elicit input from the client. A task waits in `input_required` while
    /// the client answers.
    pub async fn request_elicitation(
        &self,
        params: ElicitRequestParams,
    ) -> McpResult<ElicitResult> {
        let session = self.session()?;
        if self.task.is_none() {
            return session.request_elicitation(params).await;
        }

        // An unsupported request must leave the task status untouched.
        session.check_elicitation(&params)?;
        self.set_task_status(TaskStatus::InputRequired, Some(params.message.clone()))
            .await?;
        let result = session.request_elicitation(params).await;
        self.set_task_status(TaskStatus::Working, None).await?;
        result
    }

    pub async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> McpResult<CreateMessageResult> {
        self.session()?.create_message(params).await
    }

    pub async fn request_roots(&self) -> McpResult<ListRootsResult> {
        self.session()?.request_roots().await
    }
}
