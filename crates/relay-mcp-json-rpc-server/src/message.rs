//! Classification of inbound JSON-RPC frames.
//!
//! A bidirectional peer receives three kinds of frames on the same stream:
//! requests (method + id), notifications (method, no id) and responses to
//! requests it sent earlier (id + result/error). Responses are kept loose on
//! purpose: a peer may answer with an empty or absent `result` (e.g. a pong),
//! and whether such a frame matters is decided by the correlation layer, not
//! by its shape.

use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::types::RequestId;

/// A response received from the remote peer.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingResponse {
    pub id: RequestId,
    /// `Ok(None)` when the peer sent no `result` member at all
    pub outcome: Result<Option<Value>, JsonRpcErrorObject>,
}

/// Any frame a peer can send.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(IncomingResponse),
}

impl IncomingMessage {
    /// Parse a raw frame. Errors are ready-to-send JSON-RPC error responses.
    pub fn parse(raw: &str) -> Result<Self, JsonRpcError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| JsonRpcError::parse_error())?;
        Self::from_value(value)
    }

    /// Classify an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, JsonRpcError> {
        let Some(obj) = value.as_object() else {
            return Err(JsonRpcError::invalid_request(None));
        };

        let id = obj
            .get("id")
            .filter(|v| !v.is_null())
            .map(|v| serde_json::from_value::<RequestId>(v.clone()))
            .transpose()
            .map_err(|_| JsonRpcError::invalid_request(None))?;

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(crate::JSONRPC_VERSION) {
            return Err(JsonRpcError::invalid_request(id));
        }

        if obj.contains_key("method") {
            return match id {
                Some(id) => serde_json::from_value::<JsonRpcRequest>(value)
                    .map(IncomingMessage::Request)
                    .map_err(|_| JsonRpcError::invalid_request(Some(id))),
                None => serde_json::from_value::<JsonRpcNotification>(value)
                    .map(IncomingMessage::Notification)
                    .map_err(|_| JsonRpcError::invalid_request(None)),
            };
        }

        let Some(id) = id else {
            return Err(JsonRpcError::invalid_request(None));
        };

        let outcome = match obj.get("error") {
            Some(err) => Err(serde_json::from_value::<JsonRpcErrorObject>(err.clone())
                .map_err(|_| JsonRpcError::invalid_request(Some(id.clone())))?),
            None => Ok(obj.get("result").cloned()),
        };

        Ok(IncomingMessage::Response(IncomingResponse { id, outcome }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes;
    use serde_json::json;

    #[test]
    fn test_classifies_request() {
        let msg = IncomingMessage::parse(
            r#"{"jsonrpc":"2.0","id":1,"method":"tasks/get","params":{"taskId":"t"}}"#,
        )
        .unwrap();
        match msg {
            IncomingMessage::Request(req) => {
                assert_eq!(req.id, RequestId::Number(1));
                assert_eq!(req.method, "tasks/get");
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_classifies_notification() {
        let msg =
            IncomingMessage::parse(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn test_response_with_empty_result() {
        let msg = IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":"srv-1","result":{}}"#).unwrap();
        match msg {
            IncomingMessage::Response(resp) => {
                assert_eq!(resp.id, RequestId::String("srv-1".into()));
                assert_eq!(resp.outcome, Ok(Some(json!({}))));
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_response_with_absent_result() {
        let msg = IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":5}"#).unwrap();
        match msg {
            IncomingMessage::Response(resp) => assert_eq!(resp.outcome, Ok(None)),
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_error_response() {
        let msg = IncomingMessage::parse(
            r#"{"jsonrpc":"2.0","id":"srv-2","error":{"code":-32601,"message":"nope"}}"#,
        )
        .unwrap();
        match msg {
            IncomingMessage::Response(resp) => {
                let err = resp.outcome.unwrap_err();
                assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let err = IncomingMessage::parse("{not json").unwrap_err();
        assert_eq!(err.error.code, error_codes::PARSE_ERROR);
        assert!(err.id.is_none());
    }

    #[test]
    fn test_wrong_version_is_invalid_request() {
        let raw = r#"{"jsonrpc":"1.0","id":9,"method":"ping"}"#;
        let err = IncomingMessage::parse(raw).unwrap_err();
        assert_eq!(err.error.code, error_codes::INVALID_REQUEST);
        assert_eq!(err.id, Some(RequestId::Number(9)));
    }
}
