//! Correlation of server-initiated requests with the client's responses.
//!
//! Each session owns one [`CorrelationTable`]. Registering a request yields a
//! [`PendingResponse`] that removes its own entry when dropped, so an entry
//! never outlives its waiter whether the wait ends by response, timeout,
//! caller cancellation or session teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use relay_mcp_json_rpc_server::{IncomingResponse, RequestId};
use relay_mcp_protocol::{McpError, McpResult};

type Waiter = oneshot::Sender<McpResult<Value>>;

#[derive(Default)]
struct Pending {
    waiters: HashMap<RequestId, Waiter>,
    closed: bool,
}

/// Outstanding server-to-client requests of one session.
pub struct CorrelationTable {
    session_id: String,
    next_id: AtomicU64,
    pending: Mutex<Pending>,
}

impl CorrelationTable {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            next_id: AtomicU64::new(0),
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Allocate a fresh `srv-<n>` id and register a waiter for it.
    ///
    /// Fails with `SessionClosed` once the table has been closed.
    pub fn register(self: &Arc<Self>) -> McpResult<PendingResponse> {
        let mut pending = self.pending.lock();
        if pending.closed {
            return Err(McpError::SessionClosed(self.session_id.clone()));
        }

        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = RequestId::String(format!("srv-{}", n));
        let (tx, rx) = oneshot::channel();
        pending.waiters.insert(id.clone(), tx);

        Ok(PendingResponse {
            id,
            rx,
            table: Arc::clone(self),
        })
    }

    /// Hand a client response to its waiter.
    ///
    /// Returns `false` when nothing was waiting for `response.id`: duplicate,
    /// late and unsolicited responses (an empty-result pong included) are
    /// dropped here and never surface as errors.
    pub fn resolve(&self, response: IncomingResponse) -> bool {
        let waiter = self.pending.lock().waiters.remove(&response.id);
        let Some(waiter) = waiter else {
            debug!(
                session_id = %self.session_id,
                id = %response.id,
                "Dropping response with no pending request"
            );
            return false;
        };

        let outcome = match response.outcome {
            Ok(result) => Ok(result.unwrap_or(Value::Null)),
            Err(error) => Err(McpError::from(error)),
        };
        waiter.send(outcome).is_ok()
    }

    /// Resolve every waiter with `SessionClosed` and refuse new registrations.
    pub fn close(&self) -> usize {
        let drained: Vec<Waiter> = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            pending.waiters.drain().map(|(_, waiter)| waiter).collect()
        };

        let count = drained.len();
        for waiter in drained {
            let _ = waiter.send(Err(McpError::SessionClosed(self.session_id.clone())));
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().waiters.len()
    }

    fn forget(&self, id: &RequestId) {
        self.pending.lock().waiters.remove(id);
    }
}

/// A registered waiter. Dropping it deregisters the request id.
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<McpResult<Value>>,
    table: Arc<CorrelationTable>,
}

impl PendingResponse {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Suspend until the response arrives or the session closes.
    pub async fn wait(mut self) -> McpResult<Value> {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(McpError::SessionClosed(self.table.session_id.clone())),
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.table.forget(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_mcp_json_rpc_server::JsonRpcErrorObject;
    use serde_json::json;
    use std::time::Duration;

    fn table() -> Arc<CorrelationTable> {
        Arc::new(CorrelationTable::new("session-1"))
    }

    fn success(id: &RequestId, result: Option<Value>) -> IncomingResponse {
        IncomingResponse {
            id: id.clone(),
            outcome: Ok(result),
        }
    }

    #[tokio::test]
    async fn test_ids_are_prefixed_and_monotonic() {
        let table = table();
        let first = table.register().unwrap();
        let second = table.register().unwrap();
        assert_eq!(first.id(), &RequestId::String("srv-1".into()));
        assert_eq!(second.id(), &RequestId::String("srv-2".into()));
    }

    #[tokio::test]
    async fn test_response_reaches_waiter() {
        let table = table();
        let pending = table.register().unwrap();
        let id = pending.id().clone();

        assert!(table.resolve(success(&id, Some(json!({"roots": []})))));
        assert_eq!(pending.wait().await.unwrap(), json!({"roots": []}));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_response_becomes_mcp_error() {
        let table = table();
        let pending = table.register().unwrap();
        let id = pending.id().clone();

        table.resolve(IncomingResponse {
            id,
            outcome: Err(JsonRpcErrorObject::with_code(-32601, "nope", None)),
        });

        match pending.wait().await {
            Err(McpError::JsonRpcError { code, .. }) => assert_eq!(code, -32601),
            other => panic!("Expected JsonRpcError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_response_is_dropped() {
        let table = table();
        let pending = table.register().unwrap();
        let id = pending.id().clone();

        assert!(table.resolve(success(&id, Some(json!(1)))));
        assert!(!table.resolve(success(&id, Some(json!(2)))));
        assert_eq!(pending.wait().await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_pong_without_waiter_is_ignored() {
        let table = table();
        assert!(!table.resolve(success(&RequestId::Number(7), None)));
        let id = RequestId::String("srv-9".into());
        assert!(!table.resolve(success(&id, Some(json!({})))));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_absent_result_resolves_to_null() {
        let table = table();
        let pending = table.register().unwrap();
        let id = pending.id().clone();

        table.resolve(success(&id, None));
        assert_eq!(pending.wait().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_dropping_waiter_deregisters() {
        let table = table();
        let pending = table.register().unwrap();
        let id = pending.id().clone();
        assert_eq!(table.pending_count(), 1);

        drop(pending);
        assert_eq!(table.pending_count(), 0);
        assert!(!table.resolve(success(&id, Some(json!({})))));
    }

    #[tokio::test]
    async fn test_timed_out_wait_deregisters() {
        let table = table();
        let pending = table.register().unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), pending.wait()).await;
        assert!(result.is_err());
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_resolves_waiters_with_session_closed() {
        let table = table();
        let a = table.register().unwrap();
        let b = table.register().unwrap();

        assert_eq!(table.close(), 2);

        for pending in [a, b] {
            match pending.wait().await {
                Err(McpError::SessionClosed(id)) => assert_eq!(id, "session-1"),
                other => panic!("Expected SessionClosed, got {:?}", other),
            }
        }
        assert!(matches!(table.register(), Err(McpError::SessionClosed(_))));
    }
}
