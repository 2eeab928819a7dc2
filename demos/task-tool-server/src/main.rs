//! # Task Tool Server
//!
//! stdio MCP server exercising task-augmented tool calls.
//! Tools:
//! - `process_batch`: must run as a task; works through `items` one at a time
//!   and stops as soon as the task is cancelled
//! - `analyze_data`: runs inline or as a task; asks the client to confirm
//!   large inputs through elicitation when it can
//! - `quick_check`: inline only
//!
//! ## Usage
//! ```bash
//! RUST_LOG=debug cargo run -p task-tool-server -- --max-concurrent 4 --ttl-ms 60000
//! ```

use std::time::Duration;

use clap::Parser;
use relay_mcp_server::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "task-tool-server")]
#[command(about = "stdio MCP server with task-augmented tools")]
struct Args {
    /// Simultaneously running task bodies (0 = unlimited)
    #[arg(long, default_value = "8")]
    max_concurrent: usize,

    /// TTL applied to tasks that do not request one
    #[arg(long)]
    ttl_ms: Option<i64>,

    /// Suggested polling interval returned with each task
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// How often expired tasks are swept
    #[arg(long, default_value = "5")]
    sweep_secs: u64,

    /// Disable `tasks/list` and `tasks/cancel`
    #[arg(long)]
    tools_only: bool,
}

struct ProcessBatch;

#[async_trait]
impl McpTool for ProcessBatch {
    fn name(&self) -> &str {
        "process_batch"
    }

    fn description(&self) -> Option<&str> {
        Some("Process a batch of items, one step per item")
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "items": {"type": "array", "items": {"type": "string"}},
                "delay_ms": {"type": "integer", "minimum": 0}
            },
            "required": ["items"]
        })
    }

    fn task_support(&self) -> TaskSupport {
        TaskSupport::Required
    }

    async fn call(&self, args: Value, ctx: ToolContext) -> McpResult<CallToolResult> {
        let items = args
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| McpError::missing_param("items"))?;
        let delay_ms = args.get("delay_ms").and_then(Value::as_u64);
        let delay = Duration::from_millis(delay_ms.unwrap_or(500));

        let mut processed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            ctx.check_cancelled()?;
            debug!(
                task_id = ?ctx.task_id(),
                item = index + 1,
                total = items.len(),
                "Processing item"
            );
            tokio::time::sleep(delay).await;
            processed.push(item.as_str().unwrap_or_default().to_uppercase());
        }

        info!(task_id = ?ctx.task_id(), count = processed.len(), "Batch processed");
        Ok(CallToolResult::text(processed.join(", ")))
    }
}

struct AnalyzeData;

#[async_trait]
impl McpTool for AnalyzeData {
    fn name(&self) -> &str {
        "analyze_data"
    }

    fn description(&self) -> Option<&str> {
        Some("Summarize a list of numbers")
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"values": {"type": "array", "items": {"type": "number"}}},
            "required": ["values"]
        })
    }

    fn task_support(&self) -> TaskSupport {
        TaskSupport::Optional
    }

    async fn call(&self, args: Value, ctx: ToolContext) -> McpResult<CallToolResult> {
        let values: Vec<f64> = args
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| McpError::missing_param("values"))?
            .iter()
            .filter_map(Value::as_f64)
            .collect();
        if values.is_empty() {
            return Err(McpError::invalid_params(
                "values must contain at least one number",
            ));
        }

        let can_ask = ctx
            .session()
            .ok()
            .and_then(|s| s.client_capabilities())
            .and_then(|caps| caps.elicitation.as_ref())
            .is_some_and(|e| e.supports_form());
        if values.len() > 1000 && can_ask {
            let answer = ctx
                .request_elicitation(ElicitRequestParams::form(
                    format!("Analyze {} values?", values.len()),
                    ElicitationSchema::new().with_property("proceed", json!({"type": "boolean"})),
                ))
                .await?;
            if answer.action != ElicitAction::Accept {
                return Ok(CallToolResult::text("analysis skipped"));
            }
        }

        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(CallToolResult::text(format!(
            "count={} mean={:.3} min={} max={}",
            values.len(),
            sum / values.len() as f64,
            min,
            max
        )))
    }
}

struct QuickCheck;

#[async_trait]
impl McpTool for QuickCheck {
    fn name(&self) -> &str {
        "quick_check"
    }

    fn description(&self) -> Option<&str> {
        Some("Report whether the input is non-empty")
    }

    async fn call(&self, args: Value, _ctx: ToolContext) -> McpResult<CallToolResult> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
        let verdict = if text.trim().is_empty() { "empty" } else { "ok" };
        Ok(CallToolResult::text(verdict))
    }
}

fn logging_hooks() -> TaskHooks {
    let mut hooks = TaskHooks::new();
    hooks.add_on_task_created(|m| {
        info!(task_id = %m.task_id, tool = %m.tool_name, "Task created")
    });
    hooks.add_on_task_completed(|m| {
        info!(task_id = %m.task_id, duration_ms = m.duration.as_millis() as u64, "Task completed")
    });
    hooks.add_on_task_failed(|m| {
        info!(task_id = %m.task_id, error = ?m.error, "Task failed")
    });
    hooks.add_on_task_cancelled(|m| info!(task_id = %m.task_id, "Task cancelled"));
    hooks
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let tasks = if args.tools_only {
        TasksConfig::tools_only()
    } else {
        TasksConfig::full()
    };

    let mut builder = McpServer::builder()
        .name("task-tool-server")
        .version(env!("CARGO_PKG_VERSION"))
        .instructions(
            "Long-running tools return a task; poll tasks/get and fetch tasks/result.",
        )
        .tool(ProcessBatch)
        .tool(AnalyzeData)
        .tool(QuickCheck)
        .with_tasks(tasks)
        .max_concurrent_tasks(args.max_concurrent)
        .default_poll_interval_ms(args.poll_interval_ms)
        .task_sweep_interval(Duration::from_secs(args.sweep_secs.max(1)))
        .task_hooks(logging_hooks());
    if let Some(ttl) = args.ttl_ms {
        builder = builder.default_task_ttl_ms(ttl);
    }
    let server = builder.build()?;

    server.run_stdio().await?;
    info!("stdin closed, shutting down");
    Ok(())
}
