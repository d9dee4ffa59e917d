//! Core domain errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core domain errors for bagrun.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Duration bounds are inverted.
    #[error("Invalid bounds: lower bound {lower} is greater than upper bound {upper}")]
    InvalidBounds { lower: u64, upper: u64 },
}

/// Why a single task did not produce an outcome.
///
/// These are recovered by the aggregator: reported, excluded from the total,
/// and never allowed to abort the rest of the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TaskError {
    /// The work function returned an error.
    #[error("Workload error: {0}")]
    Workload(String),

    /// The worker panicked before returning.
    #[error("Worker panicked: {0}")]
    Panicked(String),

    /// The pool's lifetime budget ran out before the task finished.
    #[error("Walltime exceeded before the task finished")]
    WalltimeExceeded,

    /// The pool was torn down or the worker was killed.
    #[error("Task cancelled: {0}")]
    Cancelled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bounds_display() {
        let err = CoreError::InvalidBounds { lower: 5, upper: 2 };
        assert_eq!(
            err.to_string(),
            "Invalid bounds: lower bound 5 is greater than upper bound 2"
        );
    }

    #[test]
    fn test_task_error_serializes_tagged() {
        let json = serde_json::to_value(TaskError::Panicked("boom".into())).unwrap();
        assert_eq!(json["kind"], "panicked");
        assert_eq!(json["detail"], "boom");
    }
}
