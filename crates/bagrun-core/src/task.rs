//! Task specifications and what comes back from running them.

use crate::{CoreError, TaskError};
use serde::{Deserialize, Serialize};

/// One unit of work in a batch.
///
/// The index is the task's position in the submitted batch. The bounds are an
/// inclusive range the worker draws its duration from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSpec {
    index: u32,
    lower_bound: u64,
    upper_bound: u64,
}

impl TaskSpec {
    /// Create a new TaskSpec, rejecting inverted bounds.
    pub fn new(index: u32, lower_bound: u64, upper_bound: u64) -> Result<Self, CoreError> {
        if lower_bound > upper_bound {
            return Err(CoreError::InvalidBounds {
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        Ok(Self {
            index,
            lower_bound,
            upper_bound,
        })
    }

    /// Position of this task in its batch.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Inclusive lower bound of the duration range.
    pub fn lower_bound(&self) -> u64 {
        self.lower_bound
    }

    /// Inclusive upper bound of the duration range.
    pub fn upper_bound(&self) -> u64 {
        self.upper_bound
    }

    /// Check whether a duration lies inside this task's range.
    pub fn contains(&self, duration: u64) -> bool {
        (self.lower_bound..=self.upper_bound).contains(&duration)
    }
}

/// Successful result of one task, produced once by the worker that ran it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Index of the task that produced this outcome.
    pub index: u32,

    /// How long the task worked, in whole time units.
    pub duration_secs: u64,

    /// Human-readable summary of the run.
    pub message: String,
}

impl TaskOutcome {
    /// Create a new TaskOutcome.
    pub fn new(index: u32, duration_secs: u64, message: impl Into<String>) -> Self {
        Self {
            index,
            duration_secs,
            message: message.into(),
        }
    }
}

/// Failed result of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Index of the task that failed.
    pub index: u32,

    /// What went wrong.
    pub error: TaskError,
}

impl TaskFailure {
    /// Create a new TaskFailure.
    pub fn new(index: u32, error: TaskError) -> Self {
        Self { index, error }
    }
}

/// A resolved task: exactly one of outcome or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completion {
    Succeeded(TaskOutcome),
    Failed(TaskFailure),
}

impl Completion {
    /// Build a completion from a worker's result for the given task index.
    pub fn from_result(index: u32, result: Result<TaskOutcome, TaskError>) -> Self {
        match result {
            Ok(outcome) => Self::Succeeded(outcome),
            Err(error) => Self::Failed(TaskFailure::new(index, error)),
        }
    }

    /// Index of the task this completion belongs to.
    pub fn index(&self) -> u32 {
        match self {
            Self::Succeeded(outcome) => outcome.index,
            Self::Failed(failure) => failure.index,
        }
    }

    /// Returns true if the task produced an outcome.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_rejects_inverted_bounds() {
        let err = TaskSpec::new(0, 30, 15).unwrap_err();
        assert_eq!(err, CoreError::InvalidBounds { lower: 30, upper: 15 });
    }

    #[test]
    fn test_spec_accepts_equal_bounds() {
        let spec = TaskSpec::new(3, 2, 2).unwrap();
        assert_eq!(spec.index(), 3);
        assert!(spec.contains(2));
        assert!(!spec.contains(1));
        assert!(!spec.contains(3));
    }

    #[test]
    fn test_completion_index() {
        let ok = Completion::from_result(4, Ok(TaskOutcome::new(4, 7, "done")));
        assert_eq!(ok.index(), 4);
        assert!(ok.is_success());

        let failed = Completion::from_result(1, Err(TaskError::WalltimeExceeded));
        assert_eq!(failed.index(), 1);
        assert!(!failed.is_success());
        assert!(matches!(
            failed,
            Completion::Failed(TaskFailure {
                error: TaskError::WalltimeExceeded,
                ..
            })
        ));
    }
}
