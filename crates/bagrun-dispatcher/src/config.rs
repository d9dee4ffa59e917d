//! Batch and backend configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ConfigError};

/// Everything needed to run one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// What to submit.
    pub batch: BatchConfig,

    /// Where to run it.
    pub backend: BackendConfig,
}

impl RunConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Batch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of tasks to submit.
    pub n_tasks: u32,

    /// Inclusive lower bound of each task's duration.
    pub min_sleep: u64,

    /// Inclusive upper bound of each task's duration.
    pub max_sleep: u64,

    /// Seed for reproducible durations.
    pub seed: Option<u64>,

    /// Length of one duration unit in milliseconds.
    pub time_unit_ms: u64,

    /// Task indices to fail on purpose.
    pub inject_failures: Vec<u32>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            n_tasks: 10,
            min_sleep: 15,
            max_sleep: 30,
            seed: None,
            time_unit_ms: 1_000,
            inject_failures: Vec::new(),
        }
    }
}

impl BatchConfig {
    /// Length of one duration unit.
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Reject settings under which tasks would not wait out their durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_unit_ms == 0 {
            return Err(ConfigError::Invalid(
                "time_unit_ms must be greater than zero".to_string(),
            ));
        }
        if self.min_sleep > self.max_sleep {
            return Err(ConfigError::Invalid(format!(
                "min_sleep {} is greater than max_sleep {}",
                self.min_sleep, self.max_sleep
            )));
        }
        Ok(())
    }
}

/// Worker pool configuration for the execution backend.
///
/// The pool is made of blocks; each block holds `nodes_per_block` nodes with
/// `workers_per_node` workers each. The pool starts with `init_blocks` blocks
/// and grows up to `max_blocks` while tasks are waiting for a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Name used in logs.
    pub label: String,

    /// Nodes per block.
    pub nodes_per_block: u32,

    /// Workers per node.
    pub workers_per_node: u32,

    /// Blocks provisioned at start.
    pub init_blocks: u32,

    /// Blocks the pool never shrinks below.
    pub min_blocks: u32,

    /// Blocks the pool never grows beyond.
    pub max_blocks: u32,

    /// Lifetime budget of the pool, `HH:MM:SS` or whole seconds.
    pub walltime: String,

    /// Command preparing each worker's runtime. Recorded, not executed.
    pub worker_init: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            label: "local".to_string(),
            nodes_per_block: 1,
            workers_per_node: default_workers_per_node(),
            init_blocks: 1,
            min_blocks: 0,
            max_blocks: 1,
            walltime: "00:10:00".to_string(),
            worker_init: None,
        }
    }
}

fn default_workers_per_node() -> u32 {
    std::thread::available_parallelism()
        .ok()
        .and_then(|n| u32::try_from(n.get()).ok())
        .unwrap_or(1)
}

impl BackendConfig {
    /// Check the configuration and return the parsed walltime.
    pub fn validate(&self) -> Result<Duration, BackendError> {
        if self.nodes_per_block == 0 {
            return Err(BackendError::InvalidConfig(
                "nodes_per_block must be at least 1".to_string(),
            ));
        }
        if self.workers_per_node == 0 {
            return Err(BackendError::InvalidConfig(
                "workers_per_node must be at least 1".to_string(),
            ));
        }
        if self.max_blocks == 0 {
            return Err(BackendError::InvalidConfig(
                "max_blocks must be at least 1".to_string(),
            ));
        }
        if self.min_blocks > self.init_blocks || self.init_blocks > self.max_blocks {
            return Err(BackendError::InvalidConfig(format!(
                "expected min_blocks <= init_blocks <= max_blocks, got {} / {} / {}",
                self.min_blocks, self.init_blocks, self.max_blocks
            )));
        }
        if self.max_workers().is_none() {
            return Err(BackendError::InvalidConfig(
                "worker pool size overflows".to_string(),
            ));
        }
        parse_walltime(&self.walltime)
    }

    /// Workers in one block.
    pub fn workers_per_block(&self) -> Option<usize> {
        usize::try_from(self.nodes_per_block)
            .ok()?
            .checked_mul(usize::try_from(self.workers_per_node).ok()?)
    }

    /// Workers when the pool is fully scaled out.
    pub fn max_workers(&self) -> Option<usize> {
        self.workers_per_block()?
            .checked_mul(usize::try_from(self.max_blocks).ok()?)
    }

    /// Builder method to size the pool as a single block of `workers`.
    pub fn with_workers(mut self, workers: u32) -> Self {
        self.nodes_per_block = 1;
        self.workers_per_node = workers;
        self.init_blocks = 1;
        self.min_blocks = 0;
        self.max_blocks = 1;
        self
    }

    /// Builder method to set the walltime.
    pub fn with_walltime(mut self, walltime: impl Into<String>) -> Self {
        self.walltime = walltime.into();
        self
    }
}

/// Parse a walltime given as `HH:MM:SS`, `MM:SS` or whole seconds.
pub fn parse_walltime(raw: &str) -> Result<Duration, BackendError> {
    let invalid = || BackendError::InvalidConfig(format!("invalid walltime '{raw}'"));

    let mut secs: u64 = 0;
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() > 3 {
        return Err(invalid());
    }
    for (i, part) in parts.iter().enumerate() {
        let value: u64 = part.parse().map_err(|_| invalid())?;
        // Minutes and seconds fields stay below 60 once a larger field exists.
        if i > 0 && value >= 60 {
            return Err(invalid());
        }
        secs = secs
            .checked_mul(60)
            .and_then(|s| s.checked_add(value))
            .ok_or_else(invalid)?;
    }

    if secs == 0 {
        return Err(BackendError::InvalidConfig(
            "walltime must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}
