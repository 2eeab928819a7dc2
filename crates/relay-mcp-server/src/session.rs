//! Session Management for MCP Servers
//!
//! A [`ClientSession`] is one logical client connection: the capabilities
//! fixed at `initialize`, a bounded outbound channel for notifications and
//! server-to-client requests, the [`CorrelationTable`] matching the client's
//! responses to those requests, and the inbound requests still in flight.
//! The [`SessionRegistry`] owns every live session of a server.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use relay_mcp_json_rpc_server::{IncomingResponse, JsonRpcNotification, JsonRpcRequest, RequestId};
use relay_mcp_protocol::{ClientCapabilities, Implementation, InitializeParams, McpError, McpResult};

use crate::cancellation::CancellationHandle;
use crate::correlation::CorrelationTable;

/// A frame a session pushes to its client.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl OutboundMessage {
    pub fn method(&self) -> &str {
        match self {
            OutboundMessage::Request(req) => &req.method,
            OutboundMessage::Notification(notif) => &notif.method,
        }
    }
}

/// Receiving end of a session's outbound channel, drained by the transport.
pub type OutboundReceiver = mpsc::Receiver<OutboundMessage>;

/// Session-related errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Session closed: {0}")]
    Closed(String),
}

impl From<SessionError> for McpError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::Closed(id) => McpError::SessionClosed(id),
            SessionError::AlreadyInitialized(_) => McpError::InvalidRequest { message },
            SessionError::NotFound(_) => McpError::SessionError(message),
        }
    }
}

/// Per-session limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub outbound_queue_capacity: usize,
    pub client_request_timeout: Option<Duration>,
    pub session_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            client_request_timeout: Some(Duration::from_secs(60)),
            session_timeout: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Negotiated {
    protocol_version: String,
    capabilities: ClientCapabilities,
    client_info: Implementation,
}

/// One logical client connection.
pub struct ClientSession {
    id: String,
    created_at: DateTime<Utc>,
    negotiated: OnceLock<Negotiated>,
    initialized: AtomicBool,
    transport_attached: AtomicBool,
    last_accessed: Mutex<Instant>,
    outbound: Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    correlation: Arc<CorrelationTable>,
    in_flight: Mutex<HashMap<RequestId, CancellationHandle>>,
    request_timeout: Option<Duration>,
}

impl ClientSession {
    pub(crate) fn new(id: String, config: &SessionConfig) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let session = Self {
            correlation: Arc::new(CorrelationTable::new(id.clone())),
            id,
            created_at: Utc::now(),
            negotiated: OnceLock::new(),
            initialized: AtomicBool::new(false),
            transport_attached: AtomicBool::new(false),
            last_accessed: Mutex::new(Instant::now()),
            outbound: Mutex::new(Some(tx)),
            in_flight: Mutex::new(HashMap::new()),
            request_timeout: config.client_request_timeout,
        };
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // === Handshake ===

    /// Fix the client's capabilities and info. Only the first call succeeds.
    pub fn initialize(
        &self,
        params: &InitializeParams,
        protocol_version: &str,
    ) -> Result<(), SessionError> {
        self.negotiated
            .set(Negotiated {
                protocol_version: protocol_version.to_string(),
                capabilities: params.capabilities.clone(),
                client_info: params.client_info.clone(),
            })
            .map_err(|_| SessionError::AlreadyInitialized(self.id.clone()))?;

        debug!(
            session_id = %self.id,
            client = %params.client_info.name,
            protocol_version = %protocol_version,
            "Session capabilities negotiated"
        );
        Ok(())
    }

    /// Record `notifications/initialized`.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// `None` until `initialize` has been handled.
    pub fn client_capabilities(&self) -> Option<&ClientCapabilities> {
        self.negotiated.get().map(|n| &n.capabilities)
    }

    pub fn client_info(&self) -> Option<&Implementation> {
        self.negotiated.get().map(|n| &n.client_info)
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.negotiated.get().map(|n| n.protocol_version.as_str())
    }

    // === Activity ===

    pub fn touch(&self) {
        *self.last_accessed.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_accessed.lock().elapsed()
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }

    /// Mark the session as owned by a live connection. Attached sessions
    /// are never reaped for idleness.
    pub fn set_transport_attached(&self, attached: bool) {
        self.transport_attached.store(attached, Ordering::Release);
    }

    pub fn is_transport_attached(&self) -> bool {
        self.transport_attached.load(Ordering::Acquire)
    }

    // === Outbound ===

    /// Put a frame on the outbound channel without waiting.
    ///
    /// A full or closed channel fails immediately with a retryable
    /// `TransportError`.
    pub fn enqueue(&self, message: OutboundMessage) -> McpResult<()> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(McpError::TransportError(format!(
                "session {} is closed",
                self.id
            )));
        };

        tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(msg) => McpError::TransportError(format!(
                "outbound queue full for session {} (dropped {})",
                self.id,
                msg.method()
            )),
            TrySendError::Closed(_) => McpError::TransportError(format!(
                "outbound channel closed for session {}",
                self.id
            )),
        })
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.enqueue(OutboundMessage::Notification(JsonRpcNotification::new(
            method, params,
        )))
    }

    pub fn notify_typed<P: Serialize>(&self, method: &str, params: &P) -> McpResult<()> {
        self.notify(method, Some(serde_json::to_value(params)?))
    }

    /// Issue a request to the client and wait for its response.
    ///
    /// Resolves on the matching response, on `client_request_timeout`, or with
    /// `SessionClosed` at teardown. Dropping the future abandons the request;
    /// in every case the correlation entry is removed.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let pending = self.correlation.register()?;
        let request = JsonRpcRequest::new(pending.id().clone(), method, params);
        debug!(
            session_id = %self.id,
            id = %pending.id(),
            method = %method,
            "Sending request to client"
        );

        self.enqueue(OutboundMessage::Request(request))
            .map_err(|err| {
                if self.is_closed() {
                    McpError::SessionClosed(self.id.clone())
                } else {
                    err
                }
            })?;

        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, pending.wait())
                .await
                .map_err(|_| McpError::RequestTimeout(limit.as_millis() as u64))?,
            None => pending.wait().await,
        }
    }

    pub async fn request_typed<P, R>(&self, method: &str, params: &P) -> McpResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self
            .send_request(method, Some(serde_json::to_value(params)?))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Route a client response to the waiting request, if any.
    pub fn resolve_response(&self, response: IncomingResponse) -> bool {
        self.touch();
        self.correlation.resolve(response)
    }

    pub fn pending_requests(&self) -> usize {
        self.correlation.pending_count()
    }

    // === Inbound requests ===

    /// Track an inbound request so `notifications/cancelled` can reach it.
    pub fn begin_request(&self, id: RequestId) -> InFlightRequest<'_> {
        let cancellation = CancellationHandle::new();
        self.in_flight
            .lock()
            .insert(id.clone(), cancellation.clone());
        InFlightRequest {
            session: self,
            id,
            cancellation,
        }
    }

    /// Signal the in-flight request `id`. Returns `false` if it already finished.
    pub fn cancel_request(&self, id: &RequestId) -> bool {
        match self.in_flight.lock().get(id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    // === Teardown ===

    /// Close the outbound channel, fail every pending client request with
    /// `SessionClosed` and cancel in-flight inbound requests.
    pub fn close(&self) {
        let abandoned = self.correlation.close();
        self.outbound.lock().take();
        let in_flight: Vec<CancellationHandle> = self.in_flight.lock().values().cloned().collect();
        for handle in &in_flight {
            handle.cancel();
        }
        debug!(
            session_id = %self.id,
            pending = abandoned,
            in_flight = in_flight.len(),
            "Session closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.correlation.is_closed()
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .field("negotiated", &self.negotiated.get().is_some())
            .finish()
    }
}

/// Registration of an inbound request; deregisters on drop.
pub struct InFlightRequest<'a> {
    session: &'a ClientSession,
    id: RequestId,
    cancellation: CancellationHandle,
}

impl InFlightRequest<'_> {
    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }
}

impl Drop for InFlightRequest<'_> {
    fn drop(&mut self) {
        self.session.in_flight.lock().remove(&self.id);
    }
}

/// Session handle passed to handlers and tools.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: Arc<ClientSession>,
    request_cancellation: Option<CancellationHandle>,
}

impl SessionContext {
    pub fn new(session: Arc<ClientSession>) -> Self {
        Self {
            session,
            request_cancellation: None,
        }
    }

    /// Bind the cancellation signal of the inbound request being handled.
    pub fn with_request_cancellation(mut self, cancellation: CancellationHandle) -> Self {
        self.request_cancellation = Some(cancellation);
        self
    }

    /// Fires on `notifications/cancelled` for the current request or at
    /// session teardown.
    pub fn request_cancellation(&self) -> Option<&CancellationHandle> {
        self.request_cancellation.as_ref()
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn session(&self) -> &Arc<ClientSession> {
        &self.session
    }

    pub fn client_capabilities(&self) -> Option<&ClientCapabilities> {
        self.session.client_capabilities()
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.session.notify(method, params)
    }

    pub async fn send_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        self.session.send_request(method, params).await
    }
}

pub type SessionHook = Arc<dyn Fn(&ClientSession) + Send + Sync>;

/// Callbacks fired when sessions are registered and unregistered.
#[derive(Clone, Default)]
pub struct SessionHooks {
    on_register: Vec<SessionHook>,
    on_unregister: Vec<SessionHook>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_on_register<F>(&mut self, hook: F)
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        self.on_register.push(Arc::new(hook));
    }

    pub fn add_on_unregister<F>(&mut self, hook: F)
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        self.on_unregister.push(Arc::new(hook));
    }

    fn registered(&self, session: &ClientSession) {
        for hook in &self.on_register {
            hook(session);
        }
    }

    fn unregistered(&self, session: &ClientSession) {
        for hook in &self.on_unregister {
            hook(session);
        }
    }
}

impl fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHooks")
            .field("on_register", &self.on_register.len())
            .field("on_unregister", &self.on_unregister.len())
            .finish()
    }
}

/// Live sessions of one server, keyed by session id.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<ClientSession>>>,
    config: SessionConfig,
    hooks: SessionHooks,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            hooks: SessionHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register a new session under a hyphen-less UUID v7 id.
    pub fn create_session(&self) -> (Arc<ClientSession>, OutboundReceiver) {
        let id = Uuid::now_v7().simple().to_string();
        let (session, outbound) = ClientSession::new(id.clone(), &self.config);
        let session = Arc::new(session);

        self.sessions
            .write()
            .insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, "Session registered");
        self.hooks.registered(&session);

        (session, outbound)
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<ClientSession>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Unregister and close a session. Returns `false` if it was unknown.
    pub fn remove_session(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.write().remove(session_id) else {
            return false;
        };

        session.close();
        info!(session_id = %session_id, "Session unregistered");
        self.hooks.unregistered(&session);
        true
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Remove detached sessions idle longer than `session_timeout`.
    pub fn cleanup_expired(&self) -> usize {
        let timeout = self.config.session_timeout;
        let expired: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, session)| {
                !session.is_transport_attached() && session.is_expired(timeout)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let removed = expired
            .iter()
            .filter(|id| self.remove_session(id))
            .count();
        if removed > 0 {
            info!(count = removed, "Expired sessions removed");
        }
        removed
    }

    /// Spawn the idle-session cleanup loop.
    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.cleanup_expired();
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
