//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use relay_mcp_task_storage::prelude::*;
//! ```

pub use crate::error::TaskStorageError;
#[cfg(feature = "in-memory")]
pub use crate::in_memory::{InMemoryTaskConfig, InMemoryTaskStorage};
pub use crate::state_machine::{is_terminal, validate_transition};
pub use crate::traits::{TaskListPage, TaskOutcome, TaskRecord, TaskStorage, TtlPolicy};
