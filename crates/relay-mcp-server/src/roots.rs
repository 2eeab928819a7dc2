//! Roots: asking the client which URIs it exposes.

use relay_mcp_protocol::methods;
use relay_mcp_protocol::{ListRootsResult, McpError, McpResult};
use serde_json::json;

use crate::session::SessionContext;

impl SessionContext {
    /// Send `roots/list`. Requires the `roots` client capability.
    pub async fn request_roots(&self) -> McpResult<ListRootsResult> {
        let supported = self
            .client_capabilities()
            .is_some_and(|caps| caps.roots.is_some());
        if !supported {
            return Err(McpError::CapabilityNotSupported("roots".to_string()));
        }

        self.session()
            .request_typed(methods::ROOTS_LIST, &json!({}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{answer_next_request, session_with};
    use relay_mcp_protocol::initialize::RootsCapabilities;
    use relay_mcp_protocol::{ClientCapabilities, Root};
    use std::time::Duration;

    #[tokio::test]
    async fn test_requires_roots_capability() {
        let (session, mut outbound) = session_with(ClientCapabilities::default());
        let ctx = SessionContext::new(session);

        assert!(matches!(
            ctx.request_roots().await,
            Err(McpError::CapabilityNotSupported(_))
        ));
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_request_roots_round_trip() {
        let caps = ClientCapabilities {
            roots: Some(RootsCapabilities::default()),
            ..Default::default()
        };
        let (session, outbound) = session_with(caps);
        let ctx = SessionContext::new(session.clone());

        let _responder = answer_next_request(
            session,
            outbound,
            json!({"roots": [{"uri": "file:///workspace", "name": "workspace"}]}),
        );

        let result = ctx.request_roots().await.unwrap();
        assert_eq!(
            result.roots,
            vec![Root::new("file:///workspace").with_name("workspace")]
        );
    }

    #[tokio::test]
    async fn test_teardown_unblocks_request() {
        let caps = ClientCapabilities {
            roots: Some(RootsCapabilities::default()),
            ..Default::default()
        };
        let (session, _outbound) = session_with(caps);
        let ctx = SessionContext::new(session.clone());

        let waiter = tokio::spawn(async move { ctx.request_roots().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.close();

        let result = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("teardown must unblock the waiter")
            .unwrap();
        assert!(matches!(result, Err(McpError::SessionClosed(_))));
        assert_eq!(session.pending_requests(), 0);
    }
}
