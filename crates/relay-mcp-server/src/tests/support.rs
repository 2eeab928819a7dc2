//! Shared fixtures: initialized sessions, a scripted client and test tools.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use relay_mcp_json_rpc_server::{IncomingResponse, JsonRpcErrorObject, JsonRpcMessage};
use relay_mcp_protocol::{
    CallToolResult, ClientCapabilities, ElicitRequestParams, ElicitationSchema, Implementation,
    InitializeParams, MCP_VERSION, McpError, McpResult, TaskSupport,
};

use crate::server::McpServer;
use crate::session::{
    ClientSession, OutboundMessage, OutboundReceiver, SessionConfig, SessionRegistry,
};
use crate::tool::{McpTool, ToolContext};

/// A fresh session that already negotiated `capabilities`.
pub fn session_with(capabilities: ClientCapabilities) -> (Arc<ClientSession>, OutboundReceiver) {
    let registry = SessionRegistry::new(SessionConfig::default());
    let (session, outbound) = registry.create_session();
    initialize(&session, capabilities);
    (session, outbound)
}

pub fn initialize(session: &ClientSession, capabilities: ClientCapabilities) {
    let params = InitializeParams {
        protocol_version: MCP_VERSION.to_string(),
        capabilities,
        client_info: Implementation::new("test-client", "1.0.0"),
    };
    session
        .initialize(&params, MCP_VERSION)
        .expect("fresh session initializes");
    session.mark_initialized();
}

/// Send one request frame through the server and return its reply.
pub async fn send(
    server: &McpServer,
    session: &Arc<ClientSession>,
    id: i64,
    method: &str,
    params: Value,
) -> JsonRpcMessage {
    let frame = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
    server
        .handle_message(session, &frame.to_string())
        .await
        .expect("requests are always answered")
}

pub fn result_of(reply: JsonRpcMessage) -> Value {
    match reply {
        JsonRpcMessage::Response(response) => response.result,
        JsonRpcMessage::Error(err) => panic!("Expected a result, got {:?}", err.error),
    }
}

pub fn error_of(reply: JsonRpcMessage) -> JsonRpcErrorObject {
    match reply {
        JsonRpcMessage::Error(err) => err.error,
        JsonRpcMessage::Response(response) => panic!("Expected an error, got {}", response.result),
    }
}

/// A connection driven through [`McpServer::handle_message`], numbering its
/// requests from 1.
pub struct TestClient<'a> {
    server: &'a McpServer,
    session: Arc<ClientSession>,
    next_id: i64,
}

impl<'a> TestClient<'a> {
    pub fn connect(server: &'a McpServer) -> (Self, OutboundReceiver) {
        let (session, outbound) = server.connect();
        let client = Self {
            server,
            session,
            next_id: 1,
        };
        (client, outbound)
    }

    pub fn session(&self) -> &Arc<ClientSession> {
        &self.session
    }

    pub async fn request(&mut self, method: &str, params: Value) -> JsonRpcMessage {
        let id = self.next_id;
        self.next_id += 1;
        send(self.server, &self.session, id, method, params).await
    }

    pub async fn result(&mut self, method: &str, params: Value) -> Value {
        result_of(self.request(method, params).await)
    }

    pub async fn error(&mut self, method: &str, params: Value) -> JsonRpcErrorObject {
        error_of(self.request(method, params).await)
    }
}

/// `{"taskId": id}`, the params of every `tasks/*` method but list.
pub fn task_ref(task_id: &str) -> Value {
    json!({ "taskId": task_id })
}

/// Play the client: wait for the next server-to-client request, answer it
/// with `result` and hand back what was sent.
pub fn answer_next_request(
    session: Arc<ClientSession>,
    mut outbound: OutboundReceiver,
    result: Value,
) -> JoinHandle<OutboundMessage> {
    tokio::spawn(async move {
        loop {
            let message = outbound.recv().await.expect("outbound channel open");
            if let OutboundMessage::Request(request) = &message {
                session.resolve_response(IncomingResponse {
                    id: request.id.clone(),
                    outcome: Ok(Some(result)),
                });
                return message;
            }
        }
    })
}

/// Inline-only tool counting `items`.
pub struct CountTool;

#[async_trait]
impl McpTool for CountTool {
    fn name(&self) -> &str {
        "count"
    }

    fn description(&self) -> Option<&str> {
        Some("Count the items")
    }

    async fn call(&self, args: Value, _ctx: ToolContext) -> McpResult<CallToolResult> {
        let items = args
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| McpError::missing_param("items"))?;
        Ok(CallToolResult::text(format!("{} items", items.len())))
    }
}

/// Sleeps in small steps, stopping early once cancelled.
pub struct SlowTool {
    support: TaskSupport,
    delay: Duration,
}

impl SlowTool {
    pub fn new(support: TaskSupport, delay: Duration) -> Self {
        Self { support, delay }
    }
}

#[async_trait]
impl McpTool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn task_support(&self) -> TaskSupport {
        self.support
    }

    async fn call(&self, args: Value, ctx: ToolContext) -> McpResult<CallToolResult> {
        let step = Duration::from_millis(5);
        let mut waited = Duration::ZERO;
        while waited < self.delay {
            ctx.check_cancelled()?;
            tokio::time::sleep(step).await;
            waited += step;
        }
        let label = args.get("label").and_then(Value::as_str).unwrap_or("");
        Ok(CallToolResult::text(format!("slow done: {}", label)))
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl McpTool for FailingTool {
    fn name(&self) -> &str {
        "fail"
    }

    fn task_support(&self) -> TaskSupport {
        TaskSupport::Optional
    }

    async fn call(&self, _args: Value, _ctx: ToolContext) -> McpResult<CallToolResult> {
        Err(McpError::tool_execution("upstream unavailable"))
    }
}

/// Asks the client to confirm before answering.
pub struct ConfirmTool;

#[async_trait]
impl McpTool for ConfirmTool {
    fn name(&self) -> &str {
        "confirm"
    }

    fn task_support(&self) -> TaskSupport {
        TaskSupport::Optional
    }

    async fn call(&self, _args: Value, ctx: ToolContext) -> McpResult<CallToolResult> {
        let answer = ctx
            .request_elicitation(ElicitRequestParams::form(
                "Proceed?",
                ElicitationSchema::new().with_property("ok", json!({"type": "boolean"})),
            ))
            .await?;
        let ok = answer
            .content
            .as_ref()
            .and_then(|c| c.get("ok"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let text = if ok { "confirmed" } else { "declined" };
        Ok(CallToolResult::text(text))
    }
}
