//! The random-sleep workload: draw a duration, wait it out, say hello.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bagrun_core::{TaskError, TaskOutcome, TaskSpec};
use tracing::debug;

use crate::durations::{DurationSource, UniformDurations};
use crate::workload::Workload;

/// Sleeps for a random number of time units inside the task's bounds.
#[derive(Clone)]
pub struct RandomSleep {
    durations: Arc<dyn DurationSource>,
    time_unit: Duration,
}

impl RandomSleep {
    /// Create a random-sleep workload with uniform durations and one-second units.
    pub fn new() -> Self {
        Self {
            durations: Arc::new(UniformDurations::new()),
            time_unit: Duration::from_secs(1),
        }
    }

    /// Builder method to set the duration source.
    pub fn with_durations(mut self, durations: impl DurationSource + 'static) -> Self {
        self.durations = Arc::new(durations);
        self
    }

    /// Builder method to set the length of one time unit.
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        self.time_unit = unit;
        self
    }

    /// Length of one time unit.
    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }
}

impl Default for RandomSleep {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RandomSleep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSleep")
            .field("time_unit", &self.time_unit)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Workload for RandomSleep {
    async fn run(&self, spec: TaskSpec) -> Result<TaskOutcome, TaskError> {
        if self.time_unit.is_zero() {
            return Err(TaskError::Workload(
                "time unit must be greater than zero".to_string(),
            ));
        }

        let units = self.durations.draw(spec.lower_bound(), spec.upper_bound());
        let wait = u32::try_from(units)
            .ok()
            .and_then(|units| self.time_unit.checked_mul(units))
            .ok_or_else(|| TaskError::Workload(format!("duration {units} is too large")))?;

        debug!(task_index = spec.index(), duration_secs = units, "Sleeping");
        tokio::time::sleep(wait).await;

        // Output belongs to the aggregator, so the greeting travels back as data.
        let slept = if self.time_unit == Duration::from_secs(1) {
            format!("{units}s")
        } else {
            format!("{units} x {:?}", self.time_unit)
        };
        let message = format!("Hello from task {} (slept for {slept})", spec.index());
        Ok(TaskOutcome::new(spec.index(), units, message))
    }

    fn name(&self) -> &str {
        "random_sleep"
    }
}
