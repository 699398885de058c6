//! Bounded-concurrency execution of independent async tasks.
//!
//! Failures are data: each task's error (or panic) lands in that task's
//! slot of the result vector, and siblings keep running.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use roundtable_config::{ExecutionMode, ExecutorConfig};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default cap on concurrently running tasks.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Why a task's slot holds no value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("task failed: {0}")]
    Failed(E),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("admission gate closed")]
    GateClosed,
}

impl<E> TaskError<E> {
    /// The task's own error, if it returned one.
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(e) => Some(e),
            TaskError::Panicked(_) | TaskError::GateClosed => None,
        }
    }
}

type Task<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// Runs a batch of queued tasks, sequentially or with a concurrency cap,
/// and reports one result per task in registration order.
///
/// The queue is emptied when [`run`](Self::run) starts, so an executor can
/// be reused and a task is never run twice.
pub struct ConcurrentTaskExecutor<T, E> {
    mode: ExecutionMode,
    max_concurrency: usize,
    queue: Vec<Task<T, E>>,
}

impl<T, E> ConcurrentTaskExecutor<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(mode: ExecutionMode, max_concurrency: usize) -> Self {
        Self {
            mode,
            max_concurrency: max_concurrency.max(1),
            queue: Vec::new(),
        }
    }

    pub fn sequential() -> Self {
        Self::new(ExecutionMode::Sequential, 1)
    }

    pub fn concurrent(max_concurrency: usize) -> Self {
        Self::new(ExecutionMode::Concurrent, max_concurrency)
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.mode, config.max_concurrency)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Queue a task. It is not started until [`run`](Self::run).
    pub fn add<F, Fut>(&mut self, operation: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.queue.push(Box::new(move || operation().boxed()));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run every queued task and return their results in registration order.
    ///
    /// Never fails as a whole; inspect each slot.
    pub async fn run(&mut self) -> Vec<Result<T, TaskError<E>>> {
        // taken up front so the queue is empty however this future ends
        let tasks = std::mem::take(&mut self.queue);
        debug!(
            tasks = tasks.len(),
            mode = ?self.mode,
            max_concurrency = self.max_concurrency,
            "Running task batch"
        );

        let results = match self.mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(tasks.len());
                for task in tasks {
                    results.push(guarded(task).await);
                }
                results
            }
            ExecutionMode::Concurrent => {
                let gate = Arc::new(Semaphore::new(self.max_concurrency));
                join_all(tasks.into_iter().map(|task| {
                    let gate = gate.clone();
                    async move {
                        let Ok(_permit) = gate.acquire().await else {
                            return Err(TaskError::GateClosed);
                        };
                        guarded(task).await
                    }
                }))
                .await
            }
        };

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            debug!(failed, total = results.len(), "Task batch finished with failures");
        }
        results
    }
}

impl<T, E> Default for ConcurrentTaskExecutor<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::concurrent(DEFAULT_MAX_CONCURRENCY)
    }
}

/// Start `task` and capture its error or panic as a value.
async fn guarded<T, E>(task: Task<T, E>) -> Result<T, TaskError<E>> {
    match AssertUnwindSafe(async move { task().await }).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TaskError::Failed(e)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            warn!(panic = %message, "Task panicked");
            Err(TaskError::Panicked(message))
        }
    }
}
