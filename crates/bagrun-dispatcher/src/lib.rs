//! bagrun Dispatcher Library
//!
//! This crate submits a batch of task units to an execution backend, drains
//! them in completion order and aggregates the results.

pub mod as_completed;
pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod report;

pub use as_completed::{as_completed, AsCompleted};
pub use backend::{ExecutionBackend, LocalBackend, TaskHandle};
pub use config::{BackendConfig, BatchConfig, RunConfig};
pub use dispatcher::Dispatcher;
pub use error::{BackendError, ConfigError, DispatchError};
pub use report::{ConsoleReporter, JsonReporter, MemoryReporter, Reporter};
