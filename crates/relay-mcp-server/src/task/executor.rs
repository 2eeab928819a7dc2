//! Task Executor: abstraction for how task bodies run.
//!
//! Separates *how tasks run* from *how tasks are stored*. The default is
//! [`TokioTaskExecutor`](super::tokio_executor::TokioTaskExecutor), which
//! spawns each body on the Tokio runtime.

use async_trait::async_trait;
use futures::future::BoxFuture;

use relay_mcp_task_storage::TaskStorageError;

use crate::cancellation::CancellationHandle;

/// Opaque handle returned when a task is started.
pub trait TaskHandle: Send + Sync {
    /// Request cancellation of the running task.
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

/// A unit of task work. It receives the cancellation handle of its task and
/// must record its own outcome before resolving.
pub type BoxedTaskWork = Box<dyn FnOnce(CancellationHandle) -> BoxFuture<'static, ()> + Send>;

/// Runs task bodies and routes cancellation to them.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Start executing a task. Returns an opaque handle for cancellation.
    async fn start_task(
        &self,
        task_id: &str,
        work: BoxedTaskWork,
    ) -> Result<Box<dyn TaskHandle>, TaskStorageError>;

    /// Signal the running body of `task_id`. Returns `false` if no body is
    /// running under that id.
    async fn cancel_task(&self, task_id: &str) -> bool;

    /// Number of bodies currently executing.
    fn running_count(&self) -> usize;
}
