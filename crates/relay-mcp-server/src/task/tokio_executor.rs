//! Tokio-based task executor: default in-process execution using tokio::spawn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use relay_mcp_task_storage::TaskStorageError;

use crate::cancellation::CancellationHandle;
use crate::task::executor::{BoxedTaskWork, TaskExecutor, TaskHandle};

/// In-process task executor using the Tokio runtime.
///
/// Each body runs in its own spawned task, raced against its cancellation
/// handle: once cancelled, the body is dropped at its next suspension point.
/// Bodies that never yield must poll the handle themselves.
#[derive(Default)]
pub struct TokioTaskExecutor {
    running: Arc<Mutex<HashMap<String, CancellationHandle>>>,
}

impl TokioTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

struct TokioTaskHandle {
    cancellation: CancellationHandle,
}

impl TaskHandle for TokioTaskHandle {
    fn cancel(&self) {
        self.cancellation.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[async_trait]
impl TaskExecutor for TokioTaskExecutor {
    async fn start_task(
        &self,
        task_id: &str,
        work: BoxedTaskWork,
    ) -> Result<Box<dyn TaskHandle>, TaskStorageError> {
        let cancellation = CancellationHandle::new();
        {
            let mut running = self.running.lock();
            if running.contains_key(task_id) {
                return Err(TaskStorageError::DuplicateTask(task_id.to_string()));
            }
            running.insert(task_id.to_string(), cancellation.clone());
        }

        let body = work(cancellation.clone());
        let signal = cancellation.clone();
        let running = Arc::clone(&self.running);
        let task_id = task_id.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = body => {
                    debug!(task_id = %task_id, "Task body finished");
                }
                _ = signal.cancelled() => {
                    debug!(task_id = %task_id, "Task body dropped after cancellation");
                }
            }
            running.lock().remove(&task_id);
        });

        Ok(Box::new(TokioTaskHandle { cancellation }))
    }

    async fn cancel_task(&self, task_id: &str) -> bool {
        match self.running.lock().get(task_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    fn running_count(&self) -> usize {
        self.running.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_and_finish_task() {
        let executor = TokioTaskExecutor::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        executor
            .start_task(
                "task-1",
                Box::new(move |_cancel| {
                    Box::pin(async move {
                        flag.store(true, Ordering::SeqCst);
                    })
                }),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(executor.running_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_drops_body_at_suspension_point() {
        let executor = TokioTaskExecutor::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let handle = executor
            .start_task(
                "task-2",
                Box::new(move |_cancel| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        flag.store(true, Ordering::SeqCst);
                    })
                }),
            )
            .await
            .unwrap();

        assert!(executor.cancel_task("task-2").await);
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(executor.running_count(), 0);
    }

    #[tokio::test]
    async fn test_body_observes_cancellation_between_items() {
        let executor = TokioTaskExecutor::new();
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);

        let handle = executor
            .start_task(
                "task-3",
                Box::new(move |cancel| {
                    Box::pin(async move {
                        for _ in 0..100 {
                            if cancel.is_cancelled() {
                                return;
                            }
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    })
                }),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let done = processed.load(Ordering::SeqCst);
        assert!(done > 0 && done < 100, "processed {} items", done);
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let executor = TokioTaskExecutor::new();
        assert!(!executor.cancel_task("missing").await);
    }
}
