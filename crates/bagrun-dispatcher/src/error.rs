//! Dispatcher errors.

use bagrun_core::CoreError;
use thiserror::Error;

/// The execution backend could not be brought up.
///
/// Always raised before the first submission: either the pool is ready or
/// the batch does not start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("Execution backend unavailable: {0}")]
    Unavailable(String),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Batch-level errors from the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A completion carried an index that was out of range or already seen.
    #[error("Unexpected completion for task {index} in a batch of {batch_size}")]
    UnexpectedIndex { index: u32, batch_size: u32 },
}
