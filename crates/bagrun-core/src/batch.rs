//! Batch summary types.

use std::time::Duration;

use crate::BatchId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a drained batch, computed once after every handle resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Batch this summary belongs to.
    pub batch_id: BatchId,

    /// Number of tasks submitted.
    pub submitted: u32,

    /// Number of tasks that produced an outcome.
    pub succeeded: u32,

    /// Number of tasks that failed.
    pub failed: u32,

    /// Sum of durations over successful tasks; failures contribute zero.
    pub total_duration_secs: u64,

    /// Real time from the start of draining to the last completion observed.
    pub wall_clock: Duration,

    /// When draining started.
    pub started_at: DateTime<Utc>,
}

impl BatchResult {
    /// Create an empty result for a batch that is about to be drained.
    pub fn new(batch_id: BatchId, submitted: u32) -> Self {
        Self {
            batch_id,
            submitted,
            succeeded: 0,
            failed: 0,
            total_duration_secs: 0,
            wall_clock: Duration::ZERO,
            started_at: Utc::now(),
        }
    }

    /// Number of tasks observed so far.
    pub fn drained(&self) -> u32 {
        self.succeeded + self.failed
    }

    /// Returns true if every submitted task has been observed.
    pub fn is_complete(&self) -> bool {
        self.drained() == self.submitted
    }

    /// Ratio of summed work time to wall clock; above 1.0 means tasks overlapped.
    pub fn speedup(&self) -> Option<f64> {
        let wall = self.wall_clock.as_secs_f64();
        if wall > 0.0 {
            Some(self.total_duration_secs as f64 / wall)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_empty() {
        let result = BatchResult::new(BatchId::new("b"), 0);
        assert_eq!(result.total_duration_secs, 0);
        assert!(result.is_complete());
        assert_eq!(result.speedup(), None);
    }

    #[test]
    fn test_speedup() {
        let mut result = BatchResult::new(BatchId::new("b"), 3);
        result.succeeded = 3;
        result.total_duration_secs = 6;
        result.wall_clock = Duration::from_secs(2);
        assert_eq!(result.speedup(), Some(3.0));
    }
}
