//! bagrun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - An async runtime
//! - A concrete execution backend
//! - Output formatting
//!
//! All types here describe a batch of independent tasks and what came back
//! from running them.

pub mod batch;
pub mod error;
pub mod event;
pub mod ids;
pub mod task;

// Re-export commonly used types
pub use batch::BatchResult;
pub use error::{CoreError, TaskError};
pub use event::{BatchEvent, BatchEventType};
pub use ids::BatchId;
pub use task::{Completion, TaskFailure, TaskOutcome, TaskSpec};
