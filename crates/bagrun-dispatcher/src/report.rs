//! Reporting per-task results and the batch summary.
//!
//! The aggregator owns all output. Workers hand their messages back as data
//! and a [`Reporter`] renders them in drain order, so lines from concurrent
//! tasks never interleave mid-line.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use bagrun_core::{BatchEvent, BatchId, BatchResult, TaskFailure, TaskOutcome};
use tracing::warn;

/// Receives each drained task and the final summary, in drain order.
///
/// `progress` is `(drained, total)` including the task being reported.
pub trait Reporter: Send {
    fn task_completed(&mut self, batch_id: &BatchId, outcome: &TaskOutcome, progress: (u32, u32));

    fn task_failed(&mut self, batch_id: &BatchId, failure: &TaskFailure, progress: (u32, u32));

    fn batch_finished(&mut self, result: &BatchResult);
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn task_completed(&mut self, batch_id: &BatchId, outcome: &TaskOutcome, progress: (u32, u32)) {
        (**self).task_completed(batch_id, outcome, progress);
    }

    fn task_failed(&mut self, batch_id: &BatchId, failure: &TaskFailure, progress: (u32, u32)) {
        (**self).task_failed(batch_id, failure, progress);
    }

    fn batch_finished(&mut self, result: &BatchResult) {
        (**self).batch_finished(result);
    }
}

/// Human-readable lines: one per task, then one summary line.
pub struct ConsoleReporter {
    out: Box<dyn Write + Send>,
}

impl ConsoleReporter {
    /// Report to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Report to any writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    fn line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "Failed to write report line");
        }
    }
}

impl Reporter for ConsoleReporter {
    fn task_completed(&mut self, _batch_id: &BatchId, outcome: &TaskOutcome, (drained, total): (u32, u32)) {
        self.line(&format!("[{drained}/{total}] {}", outcome.message));
    }

    fn task_failed(&mut self, _batch_id: &BatchId, failure: &TaskFailure, (drained, total): (u32, u32)) {
        self.line(&format!(
            "[{drained}/{total}] Task {} failed: {}",
            failure.index, failure.error
        ));
    }

    fn batch_finished(&mut self, result: &BatchResult) {
        self.line(&format!(
            "Total sleep time: {}s, wall clock: {:.2}s ({} succeeded, {} failed)",
            result.total_duration_secs,
            result.wall_clock.as_secs_f64(),
            result.succeeded,
            result.failed
        ));
    }
}

/// One JSON [`BatchEvent`] per line.
pub struct JsonReporter {
    out: Box<dyn Write + Send>,
}

impl JsonReporter {
    /// Report to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Report to any writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    fn emit(&mut self, event: &BatchEvent) {
        let written = serde_json::to_string(event)
            .map_err(io::Error::from)
            .and_then(|json| writeln!(self.out, "{json}"))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "Failed to write JSON event");
        }
    }
}

impl Reporter for JsonReporter {
    fn task_completed(&mut self, batch_id: &BatchId, outcome: &TaskOutcome, progress: (u32, u32)) {
        self.emit(&BatchEvent::task_completed(batch_id.clone(), outcome, progress));
    }

    fn task_failed(&mut self, batch_id: &BatchId, failure: &TaskFailure, progress: (u32, u32)) {
        self.emit(&BatchEvent::task_failed(batch_id.clone(), failure, progress));
    }

    fn batch_finished(&mut self, result: &BatchResult) {
        self.emit(&BatchEvent::batch_finished(result));
    }
}

/// Keeps every event in memory. Clones share the same record.
#[derive(Clone, Default)]
pub struct MemoryReporter {
    events: Arc<Mutex<Vec<BatchEvent>>>,
}

impl MemoryReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, in drain order.
    pub fn events(&self) -> Vec<BatchEvent> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BatchEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Reporter for MemoryReporter {
    fn task_completed(&mut self, batch_id: &BatchId, outcome: &TaskOutcome, progress: (u32, u32)) {
        self.lock()
            .push(BatchEvent::task_completed(batch_id.clone(), outcome, progress));
    }

    fn task_failed(&mut self, batch_id: &BatchId, failure: &TaskFailure, progress: (u32, u32)) {
        self.lock()
            .push(BatchEvent::task_failed(batch_id.clone(), failure, progress));
    }

    fn batch_finished(&mut self, result: &BatchResult) {
        self.lock().push(BatchEvent::batch_finished(result));
    }
}
