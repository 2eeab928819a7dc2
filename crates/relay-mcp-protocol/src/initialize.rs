//! Initialize handshake and capability negotiation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Protocol version announced by this server
pub const MCP_VERSION: &str = "2025-11-25";

/// Older revisions a client may request; the server echoes a supported one back.
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-11-25", "2025-06-18", "2025-03-26"];

/// Marker capability serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingCapabilities {
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Elicitation modes a client accepts. `{}` on its own means form only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElicitationCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<EmptyObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<EmptyObject>,
}

impl ElicitationCapabilities {
    pub fn form_only() -> Self {
        Self {
            form: Some(EmptyObject {}),
            url: None,
        }
    }

    pub fn all() -> Self {
        Self {
            form: Some(EmptyObject {}),
            url: Some(EmptyObject {}),
        }
    }

    pub fn supports_form(&self) -> bool {
        self.form.is_some() || self.url.is_none()
    }

    pub fn supports_url(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksToolsCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<EmptyObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksRequestsCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<TasksToolsCapabilities>,
}

/// `capabilities.tasks`: which task methods and task-augmented requests are live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<EmptyObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<EmptyObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<TasksRequestsCapabilities>,
}

impl TasksCapabilities {
    pub fn supports_tool_calls(&self) -> bool {
        self.requests
            .as_ref()
            .and_then(|r| r.tools.as_ref())
            .and_then(|t| t.call.as_ref())
            .is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Pick the version to answer with: the client's if supported, ours otherwise.
pub fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_VERSIONS
        .iter()
        .copied()
        .find(|v| *v == requested)
        .unwrap_or(MCP_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_elicitation_means_form_only() {
        let caps: ClientCapabilities =
            serde_json::from_value(json!({"elicitation": {}})).unwrap();
        let elicitation = caps.elicitation.unwrap();
        assert!(elicitation.supports_form());
        assert!(!elicitation.supports_url());
    }

    #[test]
    fn test_url_only_elicitation() {
        let caps: ElicitationCapabilities = serde_json::from_value(json!({"url": {}})).unwrap();
        assert!(caps.supports_url());
        assert!(!caps.supports_form());
    }

    #[test]
    fn test_tasks_capabilities_wire_shape() {
        let caps = TasksCapabilities {
            list: Some(EmptyObject {}),
            cancel: None,
            requests: Some(TasksRequestsCapabilities {
                tools: Some(TasksToolsCapabilities {
                    call: Some(EmptyObject {}),
                }),
            }),
        };
        assert_eq!(
            serde_json::to_value(&caps).unwrap(),
            json!({"list": {}, "requests": {"tools": {"call": {}}}})
        );
        assert!(caps.supports_tool_calls());
    }

    #[test]
    fn test_negotiate_version() {
        assert_eq!(negotiate_version("2025-06-18"), "2025-06-18");
        assert_eq!(negotiate_version("1999-01-01"), MCP_VERSION);
    }

    #[test]
    fn test_initialize_params_without_capabilities() {
        let params: InitializeParams = serde_json::from_value(json!({
            "protocolVersion": MCP_VERSION,
            "clientInfo": {"name": "c", "version": "1"}
        }))
        .unwrap();
        assert_eq!(params.capabilities, ClientCapabilities::default());
    }
}
