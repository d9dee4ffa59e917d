//! The pluggable work function run by each task unit.

use async_trait::async_trait;
use bagrun_core::{TaskError, TaskOutcome, TaskSpec};

/// Work performed for one task.
///
/// Implementations must be free of shared mutable state between calls: the
/// backend runs many of them at once and may run the same spec twice.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Run the task described by `spec` and describe what happened.
    ///
    /// The returned outcome must carry `spec.index()`.
    async fn run(&self, spec: TaskSpec) -> Result<TaskOutcome, TaskError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "workload"
    }
}
