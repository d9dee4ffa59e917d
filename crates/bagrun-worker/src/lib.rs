//! bagrun task unit.
//!
//! A task unit is a pure function of `(index, lower_bound, upper_bound)`: it
//! does some work and hands back a [`TaskOutcome`] as data. It never writes to
//! a shared output stream; the aggregator owns output.
//!
//! # Example
//!
//! ```rust,no_run
//! async fn run() -> Result<(), bagrun_worker::WorkerError> {
//!     let outcome = bagrun_worker::execute(0, 1, 3).await?;
//!     assert!((1..=3).contains(&outcome.duration_secs));
//!     Ok(())
//! }
//! ```

mod chaos;
mod durations;
mod executor;
mod sleep;
mod workload;

pub use bagrun_core::{TaskError, TaskOutcome, TaskSpec};
pub use chaos::{FailOn, FailureMode};
pub use durations::{DurationSource, FixedDuration, UniformDurations};
pub use executor::{execute, execute_with, WorkerError};
pub use sleep::RandomSleep;
pub use workload::Workload;
