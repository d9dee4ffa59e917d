//! Failure injection around another workload.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bagrun_core::{TaskError, TaskOutcome, TaskSpec};
use tracing::warn;

use crate::workload::Workload;

/// How an injected failure shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// The workload returns an error.
    #[default]
    Error,
    /// The workload panics, as a crashing worker would.
    Panic,
}

/// Wraps a workload and fails the tasks whose index is in `indices`.
///
/// Every other task runs the inner workload untouched.
#[derive(Clone)]
pub struct FailOn {
    inner: Arc<dyn Workload>,
    indices: HashSet<u32>,
    mode: FailureMode,
}

impl FailOn {
    /// Create a wrapper failing the given task indices.
    pub fn new(inner: impl Workload + 'static, indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner: Arc::new(inner),
            indices: indices.into_iter().collect(),
            mode: FailureMode::Error,
        }
    }

    /// Builder method to set the failure mode.
    pub fn with_mode(mut self, mode: FailureMode) -> Self {
        self.mode = mode;
        self
    }
}

#[async_trait]
impl Workload for FailOn {
    async fn run(&self, spec: TaskSpec) -> Result<TaskOutcome, TaskError> {
        if !self.indices.contains(&spec.index()) {
            return self.inner.run(spec).await;
        }

        warn!(task_index = spec.index(), mode = ?self.mode, "Injecting failure");
        match self.mode {
            FailureMode::Error => Err(TaskError::Workload(format!(
                "injected failure on task {}",
                spec.index()
            ))),
            FailureMode::Panic => panic!("injected panic on task {}", spec.index()),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
