//! # Model Context Protocol: Session and Task Layer Types
//!
//! Wire types for the subset of MCP 2025-11-25 that the session and task
//! layer speaks: task lifecycle methods, capability negotiation, elicitation,
//! sampling, roots and task-augmented `tools/call`. Built on
//! `relay-mcp-json-rpc-server`.
//!
//! ```rust
//! use relay_mcp_protocol::{McpError, tasks::TaskStatus};
//!
//! let err = McpError::TaskNotFound("t-1".into());
//! assert_eq!(err.to_error_object().code, -32602);
//! assert_eq!(serde_json::to_string(&TaskStatus::InputRequired).unwrap(), "\"input_required\"");
//! ```

pub mod content;
pub mod elicitation;
pub mod initialize;
pub mod meta;
pub mod notifications;
pub mod prelude;
pub mod roots;
pub mod sampling;
pub mod tasks;
pub mod tools;

pub use content::ContentBlock;
pub use elicitation::{
    ElicitAction, ElicitRequestParams, ElicitResult, ElicitationCompleteParams, ElicitationMode,
    ElicitationSchema,
};
pub use initialize::{
    ClientCapabilities, ElicitationCapabilities, Implementation, InitializeParams,
    InitializeResult, MCP_VERSION, ServerCapabilities, TasksCapabilities,
};
pub use meta::{Cursor, Meta, RELATED_TASK_META_KEY};
pub use notifications::CancelledNotificationParams;
pub use roots::{ListRootsResult, Root};
pub use sampling::{CreateMessageParams, CreateMessageResult, SamplingMessage};
pub use tasks::{
    CancelTaskResult, CreateTaskResult, GetTaskResult, ListTasksParams, ListTasksResult, Task,
    TaskIdParams, TaskMetadata, TaskStatus,
};
pub use tools::{CallToolParams, CallToolResult, TaskSupport, Tool};

use relay_mcp_json_rpc_server::{JsonRpcError, JsonRpcErrorObject, RequestId};

/// Method names used by the session and task layer
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const TASKS_GET: &str = "tasks/get";
    pub const TASKS_LIST: &str = "tasks/list";
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    pub const TASKS_RESULT: &str = "tasks/result";
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";

    pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
    pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";
    pub const NOTIFICATION_TASK_STATUS: &str = "notifications/tasks/status";
    pub const NOTIFICATION_ELICITATION_COMPLETE: &str = "notifications/elicitation/complete";
    pub const NOTIFICATION_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
}

/// MCP server-range error codes
pub mod error_codes {
    pub const REQUEST_TIMEOUT: i64 = -32001;
    pub const TOOL_EXECUTION: i64 = -32010;
    pub const CAPABILITY_NOT_SUPPORTED: i64 = -32021;
    pub const SESSION: i64 = -32031;
    pub const TRANSPORT: i64 = -32040;
    pub const RESOURCE_EXHAUSTED: i64 = -32050;
    pub const REQUEST_CANCELLED: i64 = -32800;
}

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP-specific errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Client does not support elicitation")]
    ElicitationNotSupported,

    #[error("Client does not support {0}")]
    CapabilityNotSupported(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Request cancelled")]
    RequestCancelled,

    #[error("Client did not respond within {0}ms")]
    RequestTimeout(u64),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A JSON-RPC error with preserved code, message, and optional data.
    ///
    /// Carries errors returned by the client and replays stored task errors
    /// through `tasks/result` verbatim.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpcError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl From<JsonRpcErrorObject> for McpError {
    fn from(err: JsonRpcErrorObject) -> Self {
        Self::JsonRpcError {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl McpError {
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    pub fn tool_execution(message: &str) -> Self {
        Self::ToolExecutionError(message.to_string())
    }

    pub fn transport(message: &str) -> Self {
        Self::TransportError(message.to_string())
    }

    pub fn json_rpc_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::JsonRpcError {
            code,
            message: message.into(),
            data,
        }
    }

    /// Whether the caller may retry (queue full, channel closed).
    pub fn is_retryable(&self) -> bool {
        matches!(self, McpError::TransportError(_) | McpError::ResourceExhausted(_))
    }

    /// Convert to a JsonRpcErrorObject for JSON-RPC 2.0 responses
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        use error_codes::*;

        match self {
            McpError::TaskNotFound(id) => {
                JsonRpcErrorObject::invalid_params(&format!("Task not found: {}", id))
            }
            McpError::InvalidRequest { message } => JsonRpcErrorObject::invalid_params(message),
            McpError::InvalidParameters(msg) => JsonRpcErrorObject::invalid_params(msg),
            McpError::MissingParameter(param) => JsonRpcErrorObject::invalid_params(&format!(
                "Missing required parameter: {}",
                param
            )),
            McpError::MethodNotFound(method) => JsonRpcErrorObject::method_not_found(method),

            McpError::NoActiveSession => {
                JsonRpcErrorObject::with_code(SESSION, "No active session", None)
            }
            McpError::SessionClosed(id) => {
                JsonRpcErrorObject::with_code(SESSION, format!("Session closed: {}", id), None)
            }
            McpError::SessionError(msg) => {
                JsonRpcErrorObject::with_code(SESSION, format!("Session error: {}", msg), None)
            }
            McpError::ElicitationNotSupported => JsonRpcErrorObject::with_code(
                CAPABILITY_NOT_SUPPORTED,
                "Client does not support elicitation",
                None,
            ),
            McpError::CapabilityNotSupported(cap) => JsonRpcErrorObject::with_code(
                CAPABILITY_NOT_SUPPORTED,
                format!("Client does not support {}", cap),
                None,
            ),
            McpError::ResourceExhausted(msg) => JsonRpcErrorObject::with_code(
                RESOURCE_EXHAUSTED,
                format!("Resource exhausted: {}", msg),
                None,
            ),
            McpError::RequestCancelled => {
                JsonRpcErrorObject::with_code(REQUEST_CANCELLED, "Request cancelled", None)
            }
            McpError::RequestTimeout(ms) => JsonRpcErrorObject::with_code(
                REQUEST_TIMEOUT,
                format!("Client did not respond within {}ms", ms),
                None,
            ),
            McpError::TransportError(msg) => {
                JsonRpcErrorObject::with_code(TRANSPORT, format!("Transport error: {}", msg), None)
            }
            McpError::ToolExecutionError(msg) => JsonRpcErrorObject::with_code(
                TOOL_EXECUTION,
                format!("Tool execution failed: {}", msg),
                None,
            ),

            McpError::IoError(err) => {
                JsonRpcErrorObject::internal_error(Some(format!("IO error: {}", err)))
            }
            McpError::SerializationError(err) => {
                JsonRpcErrorObject::internal_error(Some(format!("Serialization error: {}", err)))
            }

            // Pass-through: preserves original code/message/data verbatim
            McpError::JsonRpcError {
                code,
                message,
                data,
            } => JsonRpcErrorObject::with_code(*code, message.clone(), data.clone()),
        }
    }

    /// Create a JSON-RPC error response for this MCP error
    pub fn to_json_rpc_response(&self, id: Option<RequestId>) -> JsonRpcError {
        JsonRpcError::new(id, self.to_error_object())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_mcp_json_rpc_server::error_codes as rpc;
    use serde_json::json;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(
            McpError::TaskNotFound("x".into()).to_error_object().code,
            rpc::INVALID_PARAMS
        );
        assert_eq!(
            McpError::invalid_params("already terminal")
                .to_error_object()
                .code,
            rpc::INVALID_PARAMS
        );
        assert_eq!(
            McpError::MethodNotFound("tasks/get".into())
                .to_error_object()
                .code,
            rpc::METHOD_NOT_FOUND
        );
        assert_eq!(
            McpError::NoActiveSession.to_error_object().code,
            error_codes::SESSION
        );
        assert_eq!(
            McpError::ElicitationNotSupported.to_error_object().code,
            error_codes::CAPABILITY_NOT_SUPPORTED
        );
        assert_eq!(
            McpError::ResourceExhausted("limit".into())
                .to_error_object()
                .code,
            error_codes::RESOURCE_EXHAUSTED
        );
        assert_eq!(
            McpError::RequestCancelled.to_error_object().code,
            error_codes::REQUEST_CANCELLED
        );
    }

    #[test]
    fn test_json_rpc_error_passes_through() {
        let err = McpError::json_rpc_error(-32099, "custom", Some(json!({"k": 1})));
        let obj = err.to_error_object();
        assert_eq!(obj.code, -32099);
        assert_eq!(obj.message, "custom");
        assert_eq!(obj.data, Some(json!({"k": 1})));
    }

    #[test]
    fn test_from_client_error_object() {
        let err: McpError = JsonRpcErrorObject::method_not_found("roots/list").into();
        match err {
            McpError::JsonRpcError { code, .. } => assert_eq!(code, rpc::METHOD_NOT_FOUND),
            other => panic!("Expected JsonRpcError, got {:?}", other),
        }
    }

    #[test]
    fn test_response_carries_id() {
        let resp = McpError::RequestCancelled.to_json_rpc_response(Some(RequestId::Number(4)));
        assert_eq!(resp.id, Some(RequestId::Number(4)));
        assert_eq!(resp.error.code, error_codes::REQUEST_CANCELLED);
    }

    #[test]
    fn test_retryable() {
        assert!(McpError::transport("queue full").is_retryable());
        assert!(!McpError::TaskNotFound("t".into()).is_retryable());
    }
}
