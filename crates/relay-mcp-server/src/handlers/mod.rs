//! MCP Handler System
//!
//! Every client-to-server method is served by an [`McpHandler`] registered
//! with the dispatcher under the names it reports from `supported_methods`.

pub mod initialize;
pub mod tools;

pub use initialize::InitializeHandler;
pub use tools::{CallToolHandler, ListToolsHandler};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use relay_mcp_protocol::{McpError, McpResult, methods};

use crate::session::SessionContext;

/// Generic MCP handler trait
#[async_trait]
pub trait McpHandler: Send + Sync {
    /// Handle an MCP request
    async fn handle(&self, params: Option<Value>) -> McpResult<Value>;

    /// Handle an MCP request with session context (default implementation calls handle)
    async fn handle_with_session(
        &self,
        params: Option<Value>,
        _session: Option<SessionContext>,
    ) -> McpResult<Value> {
        self.handle(params).await
    }

    /// Get the methods this handler supports
    fn supported_methods(&self) -> Vec<String>;
}

/// Ping handler for ping endpoint
pub struct PingHandler;

#[async_trait]
impl McpHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        Ok(json!({}))
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::PING.to_string()]
    }
}

/// Deserialize request params, treating absent params as `{}`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let value = params.unwrap_or_else(|| json!({}));
    serde_json::from_value(value)
        .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {}", e)))
}
