//! # Task Storage
//!
//! The task store behind task-augmented MCP requests: a `TaskStorage` trait,
//! a validated state machine, and an in-memory backend with per-task locking,
//! a single-fire completion signal and TTL expiry.
//!
//! ## Quick Start
//!
//! ```rust
//! use relay_mcp_task_storage::prelude::*;
//! use relay_mcp_protocol::TaskStatus;
//!
//! # async fn example() -> Result<(), TaskStorageError> {
//! let storage = InMemoryTaskStorage::new();
//!
//! let task = TaskRecord::new(InMemoryTaskStorage::generate_task_id(), "tools/call")
//!     .with_session("session-123")
//!     .with_ttl(Some(60_000))
//!     .with_poll_interval(Some(1_000));
//! let created = storage.create_task(task).await?;
//!
//! // First write wins; later completions are ignored
//! let done = storage
//!     .complete_task(&created.task_id, TaskOutcome::Success(serde_json::json!({})), None)
//!     .await?;
//! assert_eq!(done.map(|t| t.status), Some(TaskStatus::Completed));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`TaskStorage` trait**: CRUD, transitions, waiting, pagination, expiry
//! - **`TaskRecord`**: Persistence model (serializable, no runtime handles)
//! - **`TaskOutcome`**: Success/Error result stored for `tasks/result`
//! - **`TtlPolicy`**: TTL counted from creation (default) or from the terminal transition
//! - **State machine**: Validates transitions per the MCP task lifecycle

pub mod error;
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod prelude;
pub mod state_machine;
pub mod traits;


pub use error::TaskStorageError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryTaskConfig, InMemoryTaskStorage};
pub use state_machine::{is_terminal, validate_transition};
pub use traits::{
    MAX_TTL_MS, TaskListPage, TaskOutcome, TaskRecord, TaskStorage, TtlPolicy, format_timestamp,
    is_valid_ttl,
};

/// Create a default in-memory task storage instance.
#[cfg(feature = "in-memory")]
pub fn create_default_storage() -> InMemoryTaskStorage {
    InMemoryTaskStorage::new()
}

/// Create an in-memory task storage with custom configuration.
#[cfg(feature = "in-memory")]
pub fn create_memory_storage(config: InMemoryTaskConfig) -> InMemoryTaskStorage {
    InMemoryTaskStorage::with_config(config)
}
