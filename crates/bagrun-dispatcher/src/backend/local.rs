//! In-process worker pool.
//!
//! Workers are tokio tasks. A semaphore holds one permit per worker; a task
//! waits for a permit before its workload starts, so a pool of one worker
//! runs the batch serially and a pool of N runs up to N tasks at once.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use bagrun_core::{TaskError, TaskOutcome, TaskSpec};
use bagrun_worker::{execute_with, Workload};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ExecutionBackend, TaskHandle};
use crate::config::BackendConfig;
use crate::error::BackendError;

/// Execution backend running every worker inside the current tokio runtime.
pub struct LocalBackend {
    label: String,
    workload: Arc<dyn Workload>,
    slots: Arc<Semaphore>,
    workers_per_block: usize,
    active_blocks: AtomicU32,
    max_blocks: u32,
    in_flight: Arc<AtomicUsize>,
    deadline: Instant,
    shutdown: CancellationToken,
    runtime: Handle,
}

impl LocalBackend {
    /// Validate `config` and bring the pool up.
    ///
    /// Fails before anything is submitted if the configuration is invalid or
    /// there is no runtime to host workers.
    pub fn start(
        config: &BackendConfig,
        workload: impl Workload + 'static,
    ) -> Result<Self, BackendError> {
        Self::start_shared(config, Arc::new(workload))
    }

    /// Like [`LocalBackend::start`] for an already shared workload.
    pub fn start_shared(
        config: &BackendConfig,
        workload: Arc<dyn Workload>,
    ) -> Result<Self, BackendError> {
        let walltime = config.validate()?;

        let runtime = Handle::try_current().map_err(|e| {
            BackendError::Unavailable(format!("no async runtime to host workers: {e}"))
        })?;

        let workers_per_block = config.workers_per_block().ok_or_else(|| {
            BackendError::InvalidConfig("worker pool size overflows".to_string())
        })?;
        let max_workers = config.max_workers().unwrap_or(usize::MAX);
        if max_workers > Semaphore::MAX_PERMITS {
            return Err(BackendError::InvalidConfig(format!(
                "worker pool of {max_workers} exceeds the supported maximum"
            )));
        }
        // init_blocks <= max_blocks was validated, so this cannot overflow.
        let initial_workers = workers_per_block * config.init_blocks as usize;

        info!(
            label = %config.label,
            workload = workload.name(),
            initial_workers,
            max_workers,
            walltime_secs = walltime.as_secs(),
            "Worker pool ready"
        );
        if let Some(worker_init) = &config.worker_init {
            info!(
                label = %config.label,
                worker_init = %worker_init,
                "Workers run in-process; worker init command is recorded only"
            );
        }

        Ok(Self {
            label: config.label.clone(),
            workload,
            slots: Arc::new(Semaphore::new(initial_workers)),
            workers_per_block,
            active_blocks: AtomicU32::new(config.init_blocks),
            max_blocks: config.max_blocks,
            in_flight: Arc::new(AtomicUsize::new(0)),
            deadline: Instant::now() + walltime,
            shutdown: CancellationToken::new(),
            runtime,
        })
    }

    /// Tasks submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Blocks currently provisioned.
    pub fn active_blocks(&self) -> u32 {
        self.active_blocks.load(Ordering::SeqCst)
    }

    /// Add a block when more tasks are waiting than there are workers.
    fn scale_out_if_needed(&self) {
        if self.in_flight() <= self.capacity() {
            return;
        }

        let max_blocks = self.max_blocks;
        let grown = self
            .active_blocks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |blocks| {
                (blocks < max_blocks).then_some(blocks + 1)
            });
        if let Ok(previous) = grown {
            self.slots.add_permits(self.workers_per_block);
            info!(
                label = %self.label,
                blocks = previous + 1,
                capacity = self.capacity(),
                "Scaling out worker pool"
            );
        }
    }
}

impl ExecutionBackend for LocalBackend {
    fn submit(&self, spec: TaskSpec) -> TaskHandle {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self.in_flight.clone());
        self.scale_out_if_needed();

        let workload = self.workload.clone();
        let slots = self.slots.clone();
        let shutdown = self.shutdown.clone();
        let deadline = self.deadline;

        let join = self.runtime.spawn(async move {
            let _guard = guard;
            run_on_worker(spec, workload, slots, shutdown, deadline).await
        });

        debug!(label = %self.label, task_index = spec.index(), "Submitted task");
        TaskHandle::new(spec.index(), join)
    }

    fn capacity(&self) -> usize {
        self.workers_per_block
            .saturating_mul(self.active_blocks() as usize)
    }

    fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.slots.close();
        info!(
            label = %self.label,
            in_flight = self.in_flight(),
            "Worker pool shut down"
        );
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements the in-flight count when a task finishes, panics or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for a free worker, then run the workload within the pool's walltime.
async fn run_on_worker(
    spec: TaskSpec,
    workload: Arc<dyn Workload>,
    slots: Arc<Semaphore>,
    shutdown: CancellationToken,
    deadline: Instant,
) -> Result<TaskOutcome, TaskError> {
    let work = async move {
        let _permit = slots
            .acquire_owned()
            .await
            .map_err(|_| TaskError::Cancelled("worker pool closed".to_string()))?;
        execute_with(spec, workload.as_ref()).await
    };

    tokio::select! {
        biased;
        () = shutdown.cancelled() => {
            Err(TaskError::Cancelled("worker pool shut down".to_string()))
        }
        result = tokio::time::timeout_at(deadline, work) => match result {
            Ok(result) => result,
            Err(_) => {
                warn!(task_index = spec.index(), "Walltime exceeded");
                Err(TaskError::WalltimeExceeded)
            }
        },
    }
}
