//! MCP Server Builder
//!
//! Collects configuration, tools and hooks, then wires the session registry,
//! task runtime and method table into an [`McpServer`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use relay_mcp_protocol::initialize::ToolsCapabilities;
use relay_mcp_protocol::{Implementation, ServerCapabilities, TaskSupport};
use relay_mcp_task_storage::{InMemoryTaskConfig, InMemoryTaskStorage, TaskStorage, TtlPolicy};

use crate::config::{ServerConfig, TasksConfig};
use crate::dispatch::McpDispatcher;
use crate::handlers::{
    CallToolHandler, InitializeHandler, ListToolsHandler, McpHandler, PingHandler,
};
use crate::session::{SessionHooks, SessionRegistry};
use crate::task::{
    TaskDefaults, TaskHooks, TaskRuntime, TasksCancelHandler, TasksGetHandler, TasksListHandler,
    TasksResultHandler,
};
use crate::tool::{McpTool, ToolMap};
use crate::{McpFrameworkError, McpServer, Result};

/// Builder for MCP servers
#[derive(Default)]
pub struct McpServerBuilder {
    config: ServerConfig,
    tools: ToolMap,
    task_hooks: TaskHooks,
    session_hooks: SessionHooks,
    task_storage: Option<Arc<dyn TaskStorage>>,
    /// Registered after the built-in handlers, so they win on conflicts
    handlers: Vec<Arc<dyn McpHandler>>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
        self
    }

    pub fn tools<T: McpTool + 'static, I: IntoIterator<Item = T>>(mut self, tools: I) -> Self {
        for tool in tools {
            self = self.tool(tool);
        }
        self
    }

    /// Enable the `tasks/*` methods and task-augmented `tools/call`.
    pub fn with_tasks(mut self, tasks: TasksConfig) -> Self {
        self.config.tasks = Some(tasks);
        self
    }

    /// `0` removes the limit.
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.config.max_concurrent_tasks = max;
        self
    }

    pub fn task_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.task_sweep_interval = interval;
        self
    }

    pub fn ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.config.ttl_policy = policy;
        self
    }

    pub fn default_task_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.config.default_task_ttl_ms = Some(ttl_ms);
        self
    }

    pub fn default_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.default_poll_interval_ms = Some(interval_ms);
        self
    }

    pub fn max_tasks(mut self, max: usize) -> Self {
        self.config.max_tasks = max;
        self
    }

    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_queue_capacity = capacity;
        self
    }

    /// `None` waits for the client indefinitely.
    pub fn client_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.client_request_timeout = timeout;
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    pub fn session_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.session_cleanup_interval = interval;
        self
    }

    pub fn task_hooks(mut self, hooks: TaskHooks) -> Self {
        self.task_hooks = hooks;
        self
    }

    pub fn session_hooks(mut self, hooks: SessionHooks) -> Self {
        self.session_hooks = hooks;
        self
    }

    /// Use a custom storage backend instead of the in-memory one. The
    /// backend's own limits and TTL policy apply.
    pub fn task_storage(mut self, storage: Arc<dyn TaskStorage>) -> Self {
        self.task_storage = Some(storage);
        self
    }

    /// Register an extra method handler.
    pub fn handler<H: McpHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<McpServer> {
        self.config.validate().map_err(McpFrameworkError::Config)?;

        let tool_calls = self.config.tasks.is_some_and(|t| t.tool_calls);
        if let Some(tool) = self
            .tools
            .values()
            .find(|tool| tool.task_support() == TaskSupport::Required)
            && !tool_calls
        {
            return Err(McpFrameworkError::Config(format!(
                "tool '{}' requires task invocation but task-augmented tool calls are disabled",
                tool.name()
            )));
        }

        let config = self.config;
        let sessions = Arc::new(
            SessionRegistry::new(config.session_config()).with_hooks(self.session_hooks),
        );

        let task_runtime = config.tasks.map(|_| {
            let storage = self.task_storage.unwrap_or_else(|| {
                Arc::new(InMemoryTaskStorage::with_config(InMemoryTaskConfig {
                    max_tasks: config.max_tasks,
                    default_page_size: 50,
                    ttl_policy: config.ttl_policy,
                }))
            });
            Arc::new(
                TaskRuntime::with_default_executor(storage)
                    .with_max_concurrent_tasks(config.max_concurrent_tasks)
                    .with_defaults(TaskDefaults {
                        ttl_ms: config.default_task_ttl_ms,
                        poll_interval_ms: config.default_poll_interval_ms,
                    })
                    .with_hooks(self.task_hooks)
                    .with_session_registry(Arc::clone(&sessions)),
            )
        });

        let tools = Arc::new(self.tools);
        let mut capabilities = ServerCapabilities::default();
        if !tools.is_empty() {
            capabilities.tools = Some(ToolsCapabilities {
                list_changed: Some(false),
            });
        }
        capabilities.tasks = config.tasks.map(|t| t.to_capabilities());

        let mut dispatcher = McpDispatcher::new();
        dispatcher.register(Arc::new(PingHandler));
        dispatcher.register(Arc::new(InitializeHandler::new(
            Implementation::new(&config.name, &config.version),
            capabilities.clone(),
            config.instructions.clone(),
        )));

        if !tools.is_empty() {
            dispatcher.register(Arc::new(ListToolsHandler::new(Arc::clone(&tools))));
            let call = CallToolHandler::new(Arc::clone(&tools));
            let call = match (&task_runtime, tool_calls) {
                (Some(runtime), true) => call.with_task_runtime(Arc::clone(runtime)),
                _ => call,
            };
            dispatcher.register(Arc::new(call));
        }

        if let (Some(tasks), Some(runtime)) = (config.tasks, &task_runtime) {
            dispatcher.register(Arc::new(TasksGetHandler::new(Arc::clone(runtime))));
            dispatcher.register(Arc::new(TasksResultHandler::new(Arc::clone(runtime))));
            if tasks.list {
                dispatcher.register(Arc::new(TasksListHandler::new(Arc::clone(runtime))));
            }
            if tasks.cancel {
                dispatcher.register(Arc::new(TasksCancelHandler::new(Arc::clone(runtime))));
            }
        }

        for handler in self.handlers {
            dispatcher.register(handler);
        }

        debug!(
            name = %config.name,
            tools = tools.len(),
            tasks = config.tasks.is_some(),
            methods = ?dispatcher.methods(),
            "Built MCP server"
        );

        Ok(McpServer::new(
            config,
            sessions,
            Arc::new(dispatcher),
            task_runtime,
            tools,
            capabilities,
        ))
    }
}

impl std::fmt::Debug for McpServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServerBuilder")
            .field("config", &self.config)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Sorted names, for log output and tests.
pub(crate) fn tool_names(tools: &HashMap<String, Arc<dyn McpTool>>) -> Vec<String> {
    let mut names: Vec<String> = tools.keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{CountTool, SlowTool};

    #[test]
    fn test_rejects_empty_name() {
        let err = McpServerBuilder::new().name("").build().unwrap_err();
        assert!(matches!(err, McpFrameworkError::Config(_)));
    }

    #[test]
    fn test_required_tool_needs_task_calls() {
        let err = McpServerBuilder::new()
            .tool(SlowTool::new(
                TaskSupport::Required,
                Duration::from_millis(10),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, McpFrameworkError::Config(_)));

        let server = McpServerBuilder::new()
            .tool(SlowTool::new(
                TaskSupport::Required,
                Duration::from_millis(10),
            ))
            .with_tasks(TasksConfig::tools_only())
            .build()
            .unwrap();
        assert!(server.task_runtime().is_some());
    }

    #[test]
    fn test_method_table_follows_flags() {
        let server = McpServerBuilder::new().tool(CountTool).build().unwrap();
        let dispatcher = server.dispatcher();
        assert!(dispatcher.has_method("tools/call"));
        assert!(!dispatcher.has_method("tasks/get"));
        assert!(server.capabilities().tasks.is_none());

        let server = McpServerBuilder::new()
            .tool(CountTool)
            .with_tasks(TasksConfig::tools_only())
            .build()
            .unwrap();
        let dispatcher = server.dispatcher();
        assert!(dispatcher.has_method("tasks/get"));
        assert!(dispatcher.has_method("tasks/result"));
        assert!(!dispatcher.has_method("tasks/list"));
        assert!(!dispatcher.has_method("tasks/cancel"));
        assert_eq!(tool_names(server.tools()), vec!["count"]);
    }
}
