//! MCP Server
//!
//! The assembled server: session registry, method table, task runtime and
//! tools. Transports call [`McpServer::connect`] per connection and feed raw
//! frames through [`McpServer::handle_message`], or use the bundled stdio
//! runner.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use relay_mcp_json_rpc_server::{IncomingMessage, JsonRpcMessage};
use relay_mcp_protocol::{McpResult, ServerCapabilities};

use crate::builder::{McpServerBuilder, tool_names};
use crate::config::ServerConfig;
use crate::dispatch::McpDispatcher;
use crate::session::{ClientSession, OutboundReceiver, SessionRegistry};
use crate::stdio::StdioTransport;
use crate::task::TaskRuntime;
use crate::tool::ToolMap;

pub struct McpServer {
    config: ServerConfig,
    sessions: Arc<SessionRegistry>,
    dispatcher: Arc<McpDispatcher>,
    task_runtime: Option<Arc<TaskRuntime>>,
    tools: Arc<ToolMap>,
    capabilities: ServerCapabilities,
}

impl McpServer {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub(crate) fn new(
        config: ServerConfig,
        sessions: Arc<SessionRegistry>,
        dispatcher: Arc<McpDispatcher>,
        task_runtime: Option<Arc<TaskRuntime>>,
        tools: Arc<ToolMap>,
        capabilities: ServerCapabilities,
    ) -> Self {
        Self {
            config,
            sessions,
            dispatcher,
            task_runtime,
            tools,
            capabilities,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Arc<McpDispatcher> {
        &self.dispatcher
    }

    /// `None` when tasks are disabled.
    pub fn task_runtime(&self) -> Option<&Arc<TaskRuntime>> {
        self.task_runtime.as_ref()
    }

    pub fn tools(&self) -> &ToolMap {
        &self.tools
    }

    /// What `initialize` advertises.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Register a new connection. The receiver yields every frame the server
    /// wants delivered to this client, in enqueue order.
    pub fn connect(&self) -> (Arc<ClientSession>, OutboundReceiver) {
        self.sessions.create_session()
    }

    /// Tear a connection down: pending client requests fail with
    /// `SessionClosed` and in-flight handlers are cancelled.
    pub fn disconnect(&self, session_id: &str) -> bool {
        self.sessions.remove_session(session_id)
    }

    /// Handle one raw frame from `session`. Returns the reply, if any.
    ///
    /// Requests are answered inline; transports that must keep reading
    /// while a handler blocks should spawn this per request.
    pub async fn handle_message(
        &self,
        session: &Arc<ClientSession>,
        raw: &str,
    ) -> Option<JsonRpcMessage> {
        match IncomingMessage::parse(raw) {
            Ok(message) => self.dispatcher.dispatch(session, message).await,
            Err(err) => Some(JsonRpcMessage::Error(err)),
        }
    }

    pub fn stdio_transport(&self) -> StdioTransport {
        StdioTransport::new(Arc::clone(&self.dispatcher), Arc::clone(&self.sessions))
    }

    /// Start the background loops and serve stdin/stdout until EOF.
    pub async fn run_stdio(&self) -> McpResult<()> {
        info!(
            name = %self.config.name,
            version = %self.config.version,
            tools = ?tool_names(&self.tools),
            "Starting MCP server on stdio"
        );
        let background = self.start_background_tasks();
        let result = self.stdio_transport().run_stdio().await;
        for handle in background {
            handle.abort();
        }
        result
    }

    /// Spawn the task TTL sweeper (when tasks are enabled) and the idle
    /// session cleanup loop.
    pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);
        if let Some(runtime) = &self.task_runtime {
            let interval = self.config.task_sweep_interval;
            handles.push(Arc::clone(runtime).start_sweeper(interval));
        }
        handles.push(Arc::clone(&self.sessions).start_cleanup_task());
        handles
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("name", &self.config.name)
            .field("capabilities", &self.capabilities)
            .field("tools", &tool_names(&self.tools))
            .field("sessions", &self.sessions.session_count())
            .finish()
    }
}
