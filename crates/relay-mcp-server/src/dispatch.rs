//! Request Dispatcher
//!
//! Routes one inbound frame of a session: requests go to the registered
//! [`McpHandler`], responses resolve the session's correlation table and
//! notifications update session state.

use std::collections::HashMap;
use std::sync::Arc;

use relay_mcp_json_rpc_server::{
    IncomingMessage, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
};
use relay_mcp_protocol::{CancelledNotificationParams, McpError, methods};
use tracing::{debug, warn};

use crate::handlers::McpHandler;
use crate::session::{ClientSession, SessionContext};

/// Method table shared by every session of a server.
#[derive(Default)]
pub struct McpDispatcher {
    handlers: HashMap<String, Arc<dyn McpHandler>>,
}

impl McpDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under every method it reports. A later
    /// registration of the same method replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn McpHandler>) {
        for method in handler.supported_methods() {
            self.handlers.insert(method, Arc::clone(&handler));
        }
    }

    pub fn with_handler<H: McpHandler + 'static>(mut self, handler: H) -> Self {
        self.register(Arc::new(handler));
        self
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Handle one classified frame. Only requests produce a reply.
    pub async fn dispatch(
        &self,
        session: &Arc<ClientSession>,
        message: IncomingMessage,
    ) -> Option<JsonRpcMessage> {
        match message {
            IncomingMessage::Request(request) => Some(self.handle_request(session, request).await),
            IncomingMessage::Notification(notification) => {
                self.handle_notification(session, notification);
                None
            }
            IncomingMessage::Response(response) => {
                session.resolve_response(response);
                None
            }
        }
    }

    /// Run a request to completion or until the client cancels it.
    pub async fn handle_request(
        &self,
        session: &Arc<ClientSession>,
        request: JsonRpcRequest,
    ) -> JsonRpcMessage {
        session.touch();
        debug!(
            session_id = %session.id(),
            method = %request.method,
            id = %request.id,
            "Dispatching request"
        );

        let Some(handler) = self.handlers.get(&request.method) else {
            debug!(method = %request.method, "Method not found");
            let err = McpError::MethodNotFound(request.method);
            return JsonRpcMessage::error(Some(request.id), err.to_error_object());
        };

        if session.is_closed() {
            let err = McpError::SessionClosed(session.id().to_string());
            return JsonRpcMessage::error(Some(request.id), err.to_error_object());
        }

        let in_flight = session.begin_request(request.id.clone());
        let ctx = SessionContext::new(Arc::clone(session))
            .with_request_cancellation(in_flight.cancellation().clone());
        let outcome = tokio::select! {
            result = handler.handle_with_session(request.params, Some(ctx)) => result,
            _ = in_flight.cancellation().cancelled() => {
                debug!(session_id = %session.id(), id = %request.id, "Request cancelled by client");
                Err(McpError::RequestCancelled)
            }
        };
        drop(in_flight);

        match outcome {
            Ok(result) => JsonRpcMessage::success(request.id, result),
            Err(err) => {
                debug!(method = %request.method, error = %err, "Request failed");
                JsonRpcMessage::error(Some(request.id), err.to_error_object())
            }
        }
    }

    fn handle_notification(&self, session: &ClientSession, notification: JsonRpcNotification) {
        session.touch();
        match notification.method.as_str() {
            methods::NOTIFICATION_INITIALIZED => {
                session.mark_initialized();
                debug!(session_id = %session.id(), "Session initialized");
            }
            methods::NOTIFICATION_CANCELLED => {
                let params = notification
                    .params
                    .map(serde_json::from_value::<CancelledNotificationParams>);
                match params {
                    Some(Ok(params)) => {
                        let found = session.cancel_request(&params.request_id);
                        debug!(
                            session_id = %session.id(),
                            request_id = %params.request_id,
                            reason = ?params.reason,
                            found,
                            "Client cancelled request"
                        );
                    }
                    _ => warn!(session_id = %session.id(), "Malformed notifications/cancelled"),
                }
            }
            methods::NOTIFICATION_ROOTS_LIST_CHANGED => {
                debug!(session_id = %session.id(), "Client roots changed");
            }
            other => {
                debug!(session_id = %session.id(), method = %other, "Ignoring notification");
            }
        }
    }
}
