//! Batch dispatcher - submits tasks and aggregates their completions.

use bagrun_core::{BatchId, BatchResult, Completion, TaskSpec};
use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::as_completed::as_completed;
use crate::backend::{ExecutionBackend, TaskHandle};
use crate::error::DispatchError;
use crate::report::{ConsoleReporter, Reporter};

/// Submits batches to an execution backend and drains them in completion order.
pub struct Dispatcher<B> {
    backend: B,
    reporter: Box<dyn Reporter>,
}

impl<B: ExecutionBackend> Dispatcher<B> {
    /// Create a dispatcher reporting to stdout.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            reporter: Box::new(ConsoleReporter::stdout()),
        }
    }

    /// Builder method to set the reporter.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// The backend tasks are submitted to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shut the backend down and hand it back.
    pub fn into_backend(self) -> B {
        self.backend.shutdown();
        self.backend
    }

    /// Run `n_tasks` tasks drawing durations from `[lower_bound, upper_bound]`.
    ///
    /// Every task is submitted before any is awaited. Completions are reported
    /// as they arrive; a failed task is reported and left out of the total
    /// without stopping the rest of the batch.
    pub async fn run_batch(
        &mut self,
        n_tasks: u32,
        lower_bound: u64,
        upper_bound: u64,
    ) -> Result<BatchResult, DispatchError> {
        let specs = (0..n_tasks)
            .map(|index| TaskSpec::new(index, lower_bound, upper_bound))
            .collect::<Result<Vec<_>, _>>()?;

        let batch_id = BatchId::generate();
        info!(
            batch_id = batch_id.as_str(),
            n_tasks,
            lower_bound,
            upper_bound,
            capacity = self.backend.capacity(),
            "Submitting batch"
        );

        let handles: Vec<TaskHandle> = specs
            .into_iter()
            .map(|spec| self.backend.submit(spec))
            .collect();

        self.drain(batch_id, handles).await
    }

    /// Drain already submitted handles into a batch result.
    ///
    /// A completion with a duplicate or out-of-range index is not reported.
    /// The remaining handles are still drained and summarized before the
    /// first such error is returned.
    pub async fn drain(
        &mut self,
        batch_id: BatchId,
        handles: Vec<TaskHandle>,
    ) -> Result<BatchResult, DispatchError> {
        let submitted = u32::try_from(handles.len()).unwrap_or(u32::MAX);
        let mut tally = Tally::new(BatchResult::new(batch_id, submitted));

        let start = Instant::now();
        let mut completions = as_completed(handles);
        let mut unexpected = None;
        while let Some(completion) = completions.next().await {
            let progress = match tally.record(&completion) {
                Ok(progress) => progress,
                Err(e) => {
                    error!(
                        batch_id = tally.result.batch_id.as_str(),
                        error = %e,
                        "Discarding unexpected completion"
                    );
                    unexpected.get_or_insert(e);
                    continue;
                }
            };
            let batch_id = &tally.result.batch_id;

            match &completion {
                Completion::Succeeded(outcome) => {
                    debug!(
                        batch_id = batch_id.as_str(),
                        task_index = outcome.index,
                        duration_secs = outcome.duration_secs,
                        "Task completed"
                    );
                    self.reporter.task_completed(batch_id, outcome, progress);
                }
                Completion::Failed(failure) => {
                    warn!(
                        batch_id = batch_id.as_str(),
                        task_index = failure.index,
                        error = %failure.error,
                        "Task failed"
                    );
                    self.reporter.task_failed(batch_id, failure, progress);
                }
            }
        }
        tally.result.wall_clock = start.elapsed();

        let result = tally.result;
        info!(
            batch_id = result.batch_id.as_str(),
            succeeded = result.succeeded,
            failed = result.failed,
            total_duration_secs = result.total_duration_secs,
            wall_clock_ms = u64::try_from(result.wall_clock.as_millis()).unwrap_or(u64::MAX),
            speedup = ?result.speedup(),
            "Batch finished"
        );
        self.reporter.batch_finished(&result);

        if let Some(e) = unexpected {
            return Err(e);
        }
        debug_assert!(result.is_complete());
        Ok(result)
    }
}

/// Running totals for one drain, rejecting duplicate or foreign indices.
struct Tally {
    result: BatchResult,
    seen: Vec<bool>,
}

impl Tally {
    fn new(result: BatchResult) -> Self {
        let seen = vec![false; result.submitted as usize];
        Self { result, seen }
    }

    /// Count a completion and return `(drained, total)` including it.
    fn record(&mut self, completion: &Completion) -> Result<(u32, u32), DispatchError> {
        let index = completion.index();
        match self.seen.get_mut(index as usize) {
            Some(seen) if !*seen => *seen = true,
            _ => {
                return Err(DispatchError::UnexpectedIndex {
                    index,
                    batch_size: self.result.submitted,
                })
            }
        }

        match completion {
            Completion::Succeeded(outcome) => {
                self.result.succeeded += 1;
                self.result.total_duration_secs = self
                    .result
                    .total_duration_secs
                    .saturating_add(outcome.duration_secs);
            }
            Completion::Failed(_) => self.result.failed += 1,
        }

        Ok((self.result.drained(), self.result.submitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::config::BackendConfig;
    use crate::report::MemoryReporter;
    use async_trait::async_trait;
    use bagrun_core::{BatchEventType, CoreError, TaskError, TaskOutcome};
    use bagrun_worker::{FailOn, FailureMode, FixedDuration, RandomSleep, Workload};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fixed(secs: u64) -> RandomSleep {
        RandomSleep::new().with_durations(FixedDuration(secs))
    }

    fn dispatcher(
        workers: u32,
        workload: impl Workload + 'static,
    ) -> (Dispatcher<LocalBackend>, MemoryReporter) {
        let backend =
            LocalBackend::start(&BackendConfig::default().with_workers(workers), workload).unwrap();
        let reporter = MemoryReporter::new();
        let dispatcher = Dispatcher::new(backend).with_reporter(reporter.clone());
        (dispatcher, reporter)
    }

    fn task_indices(reporter: &MemoryReporter) -> Vec<u32> {
        reporter
            .events()
            .iter()
            .filter_map(|e| e.task_index)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_index_reported_once() {
        let (mut dispatcher, reporter) = dispatcher(4, RandomSleep::new());
        let result = dispatcher.run_batch(25, 1, 5).await.unwrap();

        assert_eq!(result.submitted, 25);
        assert_eq!(result.succeeded, 25);
        assert_eq!(result.failed, 0);

        let indices = task_indices(&reporter);
        assert_eq!(indices.len(), 25);
        let unique: BTreeSet<u32> = indices.into_iter().collect();
        assert_eq!(unique, (0..25).collect::<BTreeSet<u32>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_durations_within_bounds_and_summed() {
        let (mut dispatcher, reporter) = dispatcher(3, RandomSleep::new());
        let result = dispatcher.run_batch(12, 15, 30).await.unwrap();

        let mut sum = 0;
        for event in reporter.events() {
            if event.event_type == BatchEventType::TaskCompleted {
                let d: u64 = event.metadata["duration_secs"].parse().unwrap();
                assert!((15..=30).contains(&d));
                sum += d;
            }
        }
        assert_eq!(result.total_duration_secs, sum);
        // Runs overlap, so the wall clock stays well below the summed work.
        assert!(result.wall_clock < Duration::from_secs(sum));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tasks() {
        let (mut dispatcher, reporter) = dispatcher(1, fixed(2));
        let result = dispatcher.run_batch(0, 15, 30).await.unwrap();

        assert_eq!(result.submitted, 0);
        assert_eq!(result.total_duration_secs, 0);
        assert_eq!(result.wall_clock, Duration::ZERO);
        assert_eq!(dispatcher.backend().in_flight(), 0);

        let events = reporter.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, BatchEventType::BatchFinished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_worker_serializes() {
        let (mut dispatcher, _) = dispatcher(1, RandomSleep::new());
        let result = dispatcher.run_batch(3, 2, 2).await.unwrap();

        assert_eq!(result.total_duration_secs, 6);
        assert!(result.wall_clock >= Duration::from_secs(6));
        assert!(result.wall_clock < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_workers_run_in_parallel() {
        let (mut dispatcher, _) = dispatcher(3, RandomSleep::new());
        let result = dispatcher.run_batch(3, 2, 2).await.unwrap();

        assert_eq!(result.total_duration_secs, 6);
        assert!(result.wall_clock >= Duration::from_secs(2));
        assert!(result.wall_clock < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_failure_is_isolated() {
        let (mut dispatcher, reporter) = dispatcher(3, FailOn::new(fixed(2), [1]));
        let result = dispatcher.run_batch(3, 2, 2).await.unwrap();

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.total_duration_secs, 4);

        let events = reporter.events();
        let failed: Vec<u32> = events
            .iter()
            .filter(|e| e.event_type == BatchEventType::TaskFailed)
            .filter_map(|e| e.task_index)
            .collect();
        let completed: BTreeSet<u32> = events
            .iter()
            .filter(|e| e.event_type == BatchEventType::TaskCompleted)
            .filter_map(|e| e.task_index)
            .collect();
        assert_eq!(failed, vec![1]);
        assert_eq!(completed, BTreeSet::from([0, 2]));
        assert_eq!(
            events.last().map(|e| e.event_type),
            Some(BatchEventType::BatchFinished)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_is_reported() {
        let workload = FailOn::new(fixed(1), [0]).with_mode(FailureMode::Panic);
        let (mut dispatcher, reporter) = dispatcher(2, workload);
        let result = dispatcher.run_batch(2, 1, 1).await.unwrap();

        assert_eq!(result.failed, 1);
        assert_eq!(result.total_duration_secs, 1);

        let failure = reporter
            .events()
            .into_iter()
            .find(|e| e.event_type == BatchEventType::TaskFailed)
            .unwrap();
        assert_eq!(failure.task_index, Some(0));
        assert!(failure.metadata["error"].contains("injected panic on task 0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_in_completion_order() {
        struct Staggered;

        #[async_trait]
        impl Workload for Staggered {
            async fn run(&self, spec: TaskSpec) -> Result<TaskOutcome, TaskError> {
                // Later submissions finish first.
                let secs = 10 - u64::from(spec.index());
                tokio::time::sleep(Duration::from_secs(secs)).await;
                Ok(TaskOutcome::new(spec.index(), secs, "staggered"))
            }
        }

        let (mut dispatcher, reporter) = dispatcher(4, Staggered);
        dispatcher.run_batch(4, 0, 10).await.unwrap();

        assert_eq!(task_indices(&reporter), vec![3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_inverted_bounds_rejected_before_submission() {
        struct Counting(Arc<AtomicUsize>);

        #[async_trait]
        impl Workload for Counting {
            async fn run(&self, spec: TaskSpec) -> Result<TaskOutcome, TaskError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(TaskOutcome::new(spec.index(), 0, "ran"))
            }
        }

        let runs = Arc::new(AtomicUsize::new(0));
        let (mut dispatcher, reporter) = dispatcher(1, Counting(runs.clone()));
        let err = dispatcher.run_batch(3, 30, 15).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Core(CoreError::InvalidBounds { lower: 30, upper: 15 })
        ));
        assert_eq!(dispatcher.backend().in_flight(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_index_is_an_error() {
        let (mut dispatcher, _) = dispatcher(1, fixed(0));
        let handles = vec![
            TaskHandle::spawn(0, async { Ok(TaskOutcome::new(0, 0, "first")) }),
            TaskHandle::spawn(0, async { Ok(TaskOutcome::new(0, 0, "again")) }),
        ];

        let err = dispatcher
            .drain(BatchId::new("dup"), handles)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnexpectedIndex { index: 0, batch_size: 2 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_index_still_drains_the_rest() {
        let (mut dispatcher, reporter) = dispatcher(1, fixed(0));
        let handles = vec![
            TaskHandle::spawn(0, async { Ok(TaskOutcome::new(0, 1, "first")) }),
            TaskHandle::spawn(0, async { Ok(TaskOutcome::new(0, 1, "again")) }),
            TaskHandle::spawn(2, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(TaskOutcome::new(2, 5, "late"))
            }),
        ];

        let err = dispatcher
            .drain(BatchId::new("dup"), handles)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnexpectedIndex { index: 0, batch_size: 3 }
        ));

        let events = reporter.events();
        let completed: Vec<u32> = events
            .iter()
            .filter(|e| e.event_type == BatchEventType::TaskCompleted)
            .filter_map(|e| e.task_index)
            .collect();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains(&2));
        assert_eq!(
            events.last().map(|e| e.event_type),
            Some(BatchEventType::BatchFinished)
        );
    }

    #[tokio::test]
    async fn test_into_backend_shuts_down() {
        let (dispatcher, _) = dispatcher(1, fixed(0));
        let backend = dispatcher.into_backend();
        let handle = backend.submit(TaskSpec::new(0, 0, 0).unwrap());
        assert!(matches!(
            handle.await,
            Completion::Failed(bagrun_core::TaskFailure {
                error: TaskError::Cancelled(_),
                ..
            })
        ));
    }
}
