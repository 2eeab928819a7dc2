//! Commonly used JSON-RPC types.
//!
//! ```rust
//! use relay_mcp_json_rpc_server::prelude::*;
//! ```

pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::message::{IncomingMessage, IncomingResponse};
pub use crate::notification::JsonRpcNotification;
pub use crate::request::JsonRpcRequest;
pub use crate::response::{JsonRpcMessage, JsonRpcResponse};
pub use crate::types::{JsonRpcVersion, RequestId};

pub use crate::error_codes::*;
