//! Entry points for running a single task unit.

use bagrun_core::{CoreError, TaskError, TaskOutcome, TaskSpec};
use thiserror::Error;
use tracing::{debug, info};

use crate::sleep::RandomSleep;
use crate::workload::Workload;

/// Errors from running a task unit directly.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Run the random-sleep task unit for one index.
///
/// Draws a duration in `[lower_bound, upper_bound]` seconds, waits for it and
/// returns the greeting as data.
pub async fn execute(
    index: u32,
    lower_bound: u64,
    upper_bound: u64,
) -> Result<TaskOutcome, WorkerError> {
    let spec = TaskSpec::new(index, lower_bound, upper_bound)?;
    Ok(execute_with(spec, &RandomSleep::default()).await?)
}

/// Run `workload` for `spec`.
///
/// An outcome tagged with another task's index is turned into an error so the
/// aggregator never sees a result under the wrong index.
pub async fn execute_with(
    spec: TaskSpec,
    workload: &dyn Workload,
) -> Result<TaskOutcome, TaskError> {
    debug!(
        task_index = spec.index(),
        workload = workload.name(),
        lower = spec.lower_bound(),
        upper = spec.upper_bound(),
        "Starting task"
    );

    let outcome = workload.run(spec).await?;
    if outcome.index != spec.index() {
        return Err(TaskError::Workload(format!(
            "workload returned outcome for task {} while running task {}",
            outcome.index,
            spec.index()
        )));
    }

    info!(
        task_index = outcome.index,
        duration_secs = outcome.duration_secs,
        "Task finished"
    );
    Ok(outcome)
}
