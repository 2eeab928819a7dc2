//! Server configuration.
//!
//! Every tunable the server recognizes is a field here, with its default in
//! the `Default` impl. `McpServerBuilder` only ever writes into a
//! `ServerConfig`, so construction order never matters.

use std::time::Duration;

use relay_mcp_protocol::initialize::{
    EmptyObject, TasksCapabilities, TasksRequestsCapabilities, TasksToolsCapabilities,
};
use relay_mcp_task_storage::{MAX_TTL_MS, TtlPolicy, is_valid_ttl};

use crate::session::SessionConfig;

/// Which task methods the server exposes.
///
/// Mirrors the advertised `tasks` capability. `tasks/get` and `tasks/result`
/// are always available once tasks are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TasksConfig {
    /// Expose `tasks/list`
    pub list: bool,
    /// Expose `tasks/cancel`
    pub cancel: bool,
    /// Accept task-augmented `tools/call`
    pub tool_calls: bool,
}

impl TasksConfig {
    pub fn full() -> Self {
        Self {
            list: true,
            cancel: true,
            tool_calls: true,
        }
    }

    /// Task-augmented tool calls plus get/result, without list or cancel.
    pub fn tools_only() -> Self {
        Self {
            list: false,
            cancel: false,
            tool_calls: true,
        }
    }

    /// The capability object advertised in `initialize`.
    pub fn to_capabilities(&self) -> TasksCapabilities {
        TasksCapabilities {
            list: self.list.then(EmptyObject::default),
            cancel: self.cancel.then(EmptyObject::default),
            requests: self.tool_calls.then(|| TasksRequestsCapabilities {
                tools: Some(TasksToolsCapabilities {
                    call: Some(EmptyObject::default()),
                }),
            }),
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self::full()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,

    /// `None` disables every `tasks/*` method
    pub tasks: Option<TasksConfig>,
    /// Simultaneously executing task bodies (0 = unlimited)
    pub max_concurrent_tasks: usize,
    pub task_sweep_interval: Duration,
    pub ttl_policy: TtlPolicy,
    /// Applied when a task-augmented call does not request a TTL
    pub default_task_ttl_ms: Option<i64>,
    pub default_poll_interval_ms: Option<u64>,
    /// Hard cap on stored tasks (0 = unlimited)
    pub max_tasks: usize,

    pub outbound_queue_capacity: usize,
    /// Upper bound for server-to-client requests (`None` waits forever)
    pub client_request_timeout: Option<Duration>,
    pub session_timeout: Duration,
    pub session_cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "relay-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            tasks: None,
            max_concurrent_tasks: 10,
            task_sweep_interval: Duration::from_secs(1),
            ttl_policy: TtlPolicy::FromCreation,
            default_task_ttl_ms: None,
            default_poll_interval_ms: Some(1000),
            max_tasks: 10_000,
            outbound_queue_capacity: 256,
            client_request_timeout: Some(Duration::from_secs(60)),
            session_timeout: Duration::from_secs(30 * 60),
            session_cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            outbound_queue_capacity: self.outbound_queue_capacity,
            client_request_timeout: self.client_request_timeout,
            session_timeout: self.session_timeout,
            cleanup_interval: self.session_cleanup_interval,
        }
    }

    pub fn tasks_enabled(&self) -> bool {
        self.tasks.is_some()
    }

    /// Reject values the runtime cannot honor.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("server name must not be empty".to_string());
        }
        if self.outbound_queue_capacity == 0 {
            return Err("outbound_queue_capacity must be at least 1".to_string());
        }
        if self.task_sweep_interval.is_zero() {
            return Err("task_sweep_interval must be non-zero".to_string());
        }
        if self.session_cleanup_interval.is_zero() {
            return Err("session_cleanup_interval must be non-zero".to_string());
        }
        if let Some(ttl) = self.default_task_ttl_ms
            && !is_valid_ttl(ttl)
        {
            return Err(format!(
                "default_task_ttl_ms must be between 1 and {}, got {}",
                MAX_TTL_MS, ttl
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_concurrent_tasks, 10);
        assert_eq!(config.max_tasks, 10_000);
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.default_poll_interval_ms, Some(1000));
        assert_eq!(config.ttl_policy, TtlPolicy::FromCreation);
        assert!(!config.tasks_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_capabilities_shape() {
        let caps = serde_json::to_value(TasksConfig::full().to_capabilities()).unwrap();
        assert_eq!(
            caps,
            json!({"list": {}, "cancel": {}, "requests": {"tools": {"call": {}}}})
        );
    }

    #[test]
    fn test_tools_only_omits_list_and_cancel() {
        let capabilities = TasksConfig::tools_only().to_capabilities();
        assert!(capabilities.supports_tool_calls());
        let caps = serde_json::to_value(capabilities).unwrap();
        assert!(caps.get("list").is_none());
        assert!(caps.get("cancel").is_none());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let config = ServerConfig {
            outbound_queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_default_ttl() {
        for ttl in [0, -1, MAX_TTL_MS + 1] {
            let config = ServerConfig {
                default_task_ttl_ms: Some(ttl),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "ttl {} accepted", ttl);
        }
    }
}
