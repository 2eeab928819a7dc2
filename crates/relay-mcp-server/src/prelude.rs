//! Prelude module for common MCP server imports
//!
//! ```rust
//! use relay_mcp_server::prelude::*;
//! ```

// Re-export all protocol prelude items
pub use relay_mcp_protocol::prelude::*;

// Server core types
pub use crate::{
    CancellationHandle, McpHandler, McpServer, McpServerBuilder, McpTool, ServerConfig,
    SessionContext, TaskHooks, TaskMetrics, TasksConfig, ToolContext,
};

// Essential async trait for implementations
pub use async_trait::async_trait;

// Common serde types for serialization
pub use serde::{Deserialize, Serialize};

pub use std::sync::Arc;
