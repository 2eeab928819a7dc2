//! # Relay MCP Server
//!
//! The session and task layer of a bidirectional MCP server: per-connection
//! sessions with capability negotiation, server-to-client requests
//! (elicitation, sampling, roots) correlated over the same stream, and
//! task-augmented `tools/call` with polling, cancellation and TTL expiry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay_mcp_server::prelude::*;
//! use serde_json::Value;
//!
//! struct Report;
//!
//! #[async_trait]
//! impl McpTool for Report {
//!     fn name(&self) -> &str { "report" }
//!
//!     fn task_support(&self) -> TaskSupport { TaskSupport::Optional }
//!
//!     async fn call(&self, _args: Value, ctx: ToolContext) -> McpResult<CallToolResult> {
//!         ctx.check_cancelled()?;
//!         Ok(CallToolResult::text("done"))
//!     }
//! }
//!
//! # async fn run() -> relay_mcp_server::Result<()> {
//! let server = McpServer::builder()
//!     .name("report-server")
//!     .tool(Report)
//!     .with_tasks(TasksConfig::full())
//!     .build()?;
//! server.run_stdio().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cancellation;
pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod elicitation;
pub mod handlers;
pub mod prelude;
pub mod roots;
pub mod sampling;
pub mod server;
pub mod session;
pub mod stdio;
pub mod task;
pub mod tool;

#[cfg(test)]
mod tests;

// Re-export main types
pub use builder::McpServerBuilder;
pub use cancellation::CancellationHandle;
pub use config::{ServerConfig, TasksConfig};
pub use dispatch::McpDispatcher;
pub use handlers::McpHandler;
pub use server::McpServer;
pub use session::{
    ClientSession, OutboundMessage, OutboundReceiver, SessionConfig, SessionContext, SessionHooks,
    SessionRegistry,
};
pub use stdio::StdioTransport;
pub use task::{TaskHooks, TaskMetrics, TaskRuntime};
pub use tool::{McpTool, ToolContext};

// Re-export foundational crates
pub use relay_mcp_json_rpc_server as json_rpc;
pub use relay_mcp_protocol as protocol;
pub use relay_mcp_task_storage as task_storage;

pub use relay_mcp_protocol::McpError;

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, McpFrameworkError>;

/// Result type for handler and tool operations
pub type McpResult<T> = relay_mcp_protocol::McpResult<T>;

/// Framework-level errors
#[derive(Debug, thiserror::Error)]
pub enum McpFrameworkError {
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] relay_mcp_json_rpc_server::JsonRpcError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
