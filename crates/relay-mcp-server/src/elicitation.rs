//! Elicitation: asking the client (and its user) for input.
//!
//! Form mode is a plain request/response round trip over the session's
//! correlation table. URL mode sends the user to an out-of-band page; the
//! server later reports the flow finished with a fire-and-forget
//! `notifications/elicitation/complete`.

use relay_mcp_protocol::methods;
use relay_mcp_protocol::{
    ElicitRequestParams, ElicitResult, ElicitationCompleteParams, ElicitationMode, McpError,
    McpResult,
};
use tracing::debug;

use crate::session::SessionContext;

impl SessionContext {
    /// `ElicitationNotSupported` unless the client declared the mode of
    /// `params`; `InvalidParams` for a URL request missing its id or url.
    pub fn check_elicitation(&self, params: &ElicitRequestParams) -> McpResult<()> {
        let mode = params.effective_mode();
        let supported = self
            .client_capabilities()
            .and_then(|caps| caps.elicitation.as_ref())
            .is_some_and(|elicitation| match mode {
                ElicitationMode::Form => elicitation.supports_form(),
                ElicitationMode::Url => elicitation.supports_url(),
            });
        if !supported {
            return Err(McpError::ElicitationNotSupported);
        }

        if mode == ElicitationMode::Url && (params.elicitation_id.is_none() || params.url.is_none())
        {
            return Err(McpError::invalid_params(
                "URL elicitation requires elicitationId and url",
            ));
        }
        Ok(())
    }

    /// Send `elicitation/create` and wait for the client's answer.
    ///
    /// Fails before anything is enqueued when [`check_elicitation`] does.
    ///
    /// [`check_elicitation`]: Self::check_elicitation
    pub async fn request_elicitation(
        &self,
        params: ElicitRequestParams,
    ) -> McpResult<ElicitResult> {
        self.check_elicitation(&params)?;
        let mode = params.effective_mode();
        debug!(session_id = %self.session_id(), mode = ?mode, "Requesting elicitation");
        self.session()
            .request_typed(methods::ELICITATION_CREATE, &params)
            .await
    }

    pub async fn request_url_elicitation(
        &self,
        message: impl Into<String>,
        elicitation_id: impl Into<String>,
        url: impl Into<String>,
    ) -> McpResult<ElicitResult> {
        self.request_elicitation(ElicitRequestParams::url(message, elicitation_id, url))
            .await
    }

    /// Tell the client an out-of-band elicitation finished.
    ///
    /// No prior request is needed and nothing is awaited.
    pub fn send_elicitation_complete(&self, elicitation_id: impl Into<String>) -> McpResult<()> {
        self.session().notify_typed(
            methods::NOTIFICATION_ELICITATION_COMPLETE,
            &ElicitationCompleteParams {
                elicitation_id: elicitation_id.into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OutboundMessage;
    use crate::tests::support::{answer_next_request, session_with};
    use relay_mcp_protocol::initialize::ElicitationCapabilities;
    use relay_mcp_protocol::{ClientCapabilities, ElicitAction, ElicitationSchema};
    use serde_json::json;

    fn form_params() -> ElicitRequestParams {
        ElicitRequestParams::form(
            "Confirm deployment",
            ElicitationSchema::new().with_property("confirm", json!({"type": "boolean"})),
        )
    }

    #[tokio::test]
    async fn test_unsupported_elicitation_enqueues_nothing() {
        let (session, mut outbound) = session_with(ClientCapabilities::default());
        let ctx = SessionContext::new(session);

        match ctx.request_elicitation(form_params()).await {
            Err(McpError::ElicitationNotSupported) => {}
            other => panic!("Expected ElicitationNotSupported, got {:?}", other),
        }
        assert!(outbound.try_recv().is_err(), "no frame may be enqueued");
        assert_eq!(ctx.session().pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_form_elicitation_round_trip() {
        let caps = ClientCapabilities {
            elicitation: Some(ElicitationCapabilities::default()),
            ..Default::default()
        };
        let (session, outbound) = session_with(caps);
        let ctx = SessionContext::new(session.clone());

        let responder = answer_next_request(
            session,
            outbound,
            json!({"action": "accept", "content": {"confirm": true}}),
        );

        let result = ctx.request_elicitation(form_params()).await.unwrap();
        assert_eq!(result.action, ElicitAction::Accept);
        assert_eq!(result.content.unwrap()["confirm"], json!(true));

        let sent = responder.await.unwrap();
        assert_eq!(sent.method(), "elicitation/create");
    }

    #[tokio::test]
    async fn test_url_mode_requires_url_capability() {
        let caps = ClientCapabilities {
            elicitation: Some(ElicitationCapabilities::form_only()),
            ..Default::default()
        };
        let (session, mut outbound) = session_with(caps);
        let ctx = SessionContext::new(session);

        let err = ctx
            .request_url_elicitation("Authorize", "el-1", "https://example.com/auth")
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ElicitationNotSupported));
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_elicitation_complete_is_a_plain_notification() {
        let (session, mut outbound) = session_with(ClientCapabilities::default());
        let ctx = SessionContext::new(session);

        ctx.send_elicitation_complete("el-42").unwrap();

        match outbound.try_recv().unwrap() {
            OutboundMessage::Notification(notif) => {
                assert_eq!(notif.method, "notifications/elicitation/complete");
                assert_eq!(notif.get_param("elicitationId"), Some(&json!("el-42")));
            }
            other => panic!("Expected notification, got {:?}", other),
        }
        assert_eq!(ctx.session().pending_requests(), 0);
    }
}
