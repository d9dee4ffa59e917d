//! Execution backends and the handles they return.

mod local;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bagrun_core::{Completion, TaskError, TaskFailure, TaskOutcome, TaskSpec};
use tokio::task::{JoinError, JoinHandle};

pub use local::LocalBackend;

/// A service that runs submitted tasks on a pool of workers.
pub trait ExecutionBackend: Send + Sync {
    /// Submit a task. Must not wait for any task to finish.
    fn submit(&self, spec: TaskSpec) -> TaskHandle;

    /// Workers currently able to run tasks at the same time.
    fn capacity(&self) -> usize;

    /// Release pool resources. Tasks that have not finished fail.
    fn shutdown(&self);
}

/// Handle to a submitted task's eventual completion.
///
/// Resolves to exactly one [`Completion`] carrying the submitted index. A
/// worker that panics or is aborted resolves to a failure, never to nothing.
#[derive(Debug)]
pub struct TaskHandle {
    index: u32,
    join: JoinHandle<Result<TaskOutcome, TaskError>>,
}

impl TaskHandle {
    /// Wrap a spawned worker for the task at `index`.
    pub fn new(index: u32, join: JoinHandle<Result<TaskOutcome, TaskError>>) -> Self {
        Self { index, join }
    }

    /// Spawn `work` on the current runtime as the task at `index`.
    pub fn spawn<F>(index: u32, work: F) -> Self
    where
        F: Future<Output = Result<TaskOutcome, TaskError>> + Send + 'static,
    {
        Self::new(index, tokio::spawn(work))
    }

    /// Index of the submitted task.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns true once the worker has stopped, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Kill the worker. The handle then resolves to a cancellation failure.
    pub fn abort(&self) {
        self.join.abort();
    }
}

impl Future for TaskHandle {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let index = self.index;
        match Pin::new(&mut self.join).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(Completion::from_result(index, result)),
            Poll::Ready(Err(err)) => {
                Poll::Ready(Completion::Failed(TaskFailure::new(index, join_failure(err))))
            }
        }
    }
}

fn join_failure(err: JoinError) -> TaskError {
    if !err.is_panic() {
        return TaskError::Cancelled("worker was killed".to_string());
    }

    let payload = err.into_panic();
    let detail = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    TaskError::Panicked(detail)
}
