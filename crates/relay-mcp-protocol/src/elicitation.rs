//! Elicitation: server-to-client requests for user input.
//!
//! Form mode carries a flat JSON schema the client renders; URL mode points
//! the user at an out-of-band page and is finished later by a
//! `notifications/elicitation/complete` notification.

use crate::meta::Meta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitationMode {
    Form,
    Url,
}

/// Restricted object schema for form-mode elicitation. Property schemas are
/// relayed as-is; the client validates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl Default for ElicitationSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl ElicitationSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = Some(required);
        self
    }
}

/// Params of `elicitation/create`. `mode` omitted means form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitRequestParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ElicitationMode>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_schema: Option<ElicitationSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ElicitRequestParams {
    pub fn form(message: impl Into<String>, requested_schema: ElicitationSchema) -> Self {
        Self {
            mode: None,
            message: message.into(),
            requested_schema: Some(requested_schema),
            elicitation_id: None,
            url: None,
            meta: None,
        }
    }

    pub fn url(
        message: impl Into<String>,
        elicitation_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            mode: Some(ElicitationMode::Url),
            message: message.into(),
            requested_schema: None,
            elicitation_id: Some(elicitation_id.into()),
            url: Some(url.into()),
            meta: None,
        }
    }

    pub fn effective_mode(&self) -> ElicitationMode {
        self.mode.unwrap_or(ElicitationMode::Form)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitResult {
    pub action: ElicitAction,
    /// Submitted form values, present on `accept` in form mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, Value>>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Params of `notifications/elicitation/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitationCompleteParams {
    pub elicitation_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_params_omit_mode() {
        let params = ElicitRequestParams::form(
            "Confirm deployment",
            ElicitationSchema::new()
                .with_property("confirm", json!({"type": "boolean"}))
                .with_required(vec!["confirm".into()]),
        );
        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("mode").is_none());
        assert_eq!(value["requestedSchema"]["type"], "object");
        assert_eq!(value["requestedSchema"]["required"], json!(["confirm"]));
        assert_eq!(params.effective_mode(), ElicitationMode::Form);
    }

    #[test]
    fn test_url_params_shape() {
        let params = ElicitRequestParams::url("Sign in", "el-7", "https://example.com/auth");
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "mode": "url",
                "message": "Sign in",
                "elicitationId": "el-7",
                "url": "https://example.com/auth"
            })
        );
    }

    #[test]
    fn test_elicit_result_actions() {
        let accepted: ElicitResult =
            serde_json::from_value(json!({"action": "accept", "content": {"confirm": true}}))
                .unwrap();
        assert_eq!(accepted.action, ElicitAction::Accept);
        assert_eq!(accepted.content.unwrap()["confirm"], json!(true));

        let declined: ElicitResult = serde_json::from_value(json!({"action": "decline"})).unwrap();
        assert_eq!(declined.action, ElicitAction::Decline);
        assert!(declined.content.is_none());
    }
}
