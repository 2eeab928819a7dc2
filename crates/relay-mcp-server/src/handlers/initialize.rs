//! `initialize`: version negotiation and capability exchange.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use relay_mcp_protocol::initialize::negotiate_version;
use relay_mcp_protocol::{
    Implementation, InitializeParams, InitializeResult, McpError, McpResult, ServerCapabilities,
    methods,
};

use super::{McpHandler, parse_params};
use crate::session::SessionContext;

/// Records the client's capabilities on its session and answers with ours.
pub struct InitializeHandler {
    server_info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
}

impl InitializeHandler {
    pub fn new(
        server_info: Implementation,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
    ) -> Self {
        Self {
            server_info,
            capabilities,
            instructions,
        }
    }

    fn respond(&self, params: &InitializeParams) -> McpResult<(String, Value)> {
        let version = negotiate_version(&params.protocol_version);
        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };
        Ok((version.to_string(), serde_json::to_value(result)?))
    }
}

#[async_trait]
impl McpHandler for InitializeHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = parse_params(params)?;
        self.respond(&params).map(|(_, value)| value)
    }

    async fn handle_with_session(
        &self,
        params: Option<Value>,
        session: Option<SessionContext>,
    ) -> McpResult<Value> {
        let params: InitializeParams = parse_params(params)?;
        let (version, value) = self.respond(&params)?;

        if let Some(ctx) = session {
            ctx.session()
                .initialize(&params, &version)
                .map_err(McpError::from)?;
            info!(
                session_id = %ctx.session_id(),
                client = %params.client_info.name,
                protocol_version = %version,
                "Client initialized"
            );
        }
        Ok(value)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::INITIALIZE.to_string()]
    }
}
