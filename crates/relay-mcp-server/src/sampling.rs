//! Sampling: asking the client's model for a completion.

use relay_mcp_protocol::methods;
use relay_mcp_protocol::{CreateMessageParams, CreateMessageResult, McpError, McpResult};

use crate::session::SessionContext;

impl SessionContext {
    /// Send `sampling/createMessage`. Requires the `sampling` client capability.
    pub async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> McpResult<CreateMessageResult> {
        let supported = self
            .client_capabilities()
            .is_some_and(|caps| caps.sampling.is_some());
        if !supported {
            return Err(McpError::CapabilityNotSupported("sampling".to_string()));
        }

        self.session()
            .request_typed(methods::SAMPLING_CREATE_MESSAGE, &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{answer_next_request, session_with};
    use relay_mcp_protocol::initialize::SamplingCapabilities;
    use relay_mcp_protocol::{ClientCapabilities, SamplingMessage};
    use serde_json::json;

    fn params() -> CreateMessageParams {
        CreateMessageParams::new(vec![SamplingMessage::user_text("Summarize the batch")], 64)
    }

    #[tokio::test]
    async fn test_requires_sampling_capability() {
        let (session, mut outbound) = session_with(ClientCapabilities::default());
        let ctx = SessionContext::new(session);

        match ctx.create_message(params()).await {
            Err(McpError::CapabilityNotSupported(cap)) => assert_eq!(cap, "sampling"),
            other => panic!("Expected CapabilityNotSupported, got {:?}", other),
        }
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_create_message_round_trip() {
        let caps = ClientCapabilities {
            sampling: Some(SamplingCapabilities::default()),
            ..Default::default()
        };
        let (session, outbound) = session_with(caps);
        let ctx = SessionContext::new(session.clone());

        let responder = answer_next_request(
            session,
            outbound,
            json!({
                "role": "assistant",
                "content": {"type": "text", "text": "All items processed"},
                "model": "test-model",
                "stopReason": "endTurn"
            }),
        );

        let result = ctx.create_message(params()).await.unwrap();
        assert_eq!(result.model, "test-model");
        assert_eq!(result.content.as_text(), Some("All items processed"));

        let sent = responder.await.unwrap();
        assert_eq!(sent.method(), "sampling/createMessage");
    }
}
