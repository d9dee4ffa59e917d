//! Batch events for streaming per-task results to observers.

use std::collections::HashMap;

use crate::ids::BatchId;
use crate::{BatchResult, TaskFailure, TaskOutcome};
use serde::{Deserialize, Serialize};

/// A batch event, emitted once per drained task and once at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvent {
    /// Batch this event belongs to.
    pub batch_id: BatchId,
    /// Type of event.
    pub event_type: BatchEventType,
    /// Index of the task, absent for batch-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_index: Option<u32>,
    /// Unix timestamp (milliseconds) when event occurred.
    pub timestamp_ms: i64,
    /// Event-specific metadata (message, error, duration, totals, etc.).
    pub metadata: HashMap<String, String>,
}

impl BatchEvent {
    /// Create a new batch event.
    pub fn new(
        batch_id: BatchId,
        event_type: BatchEventType,
        task_index: Option<u32>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            batch_id,
            event_type,
            task_index,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            metadata,
        }
    }

    /// Create a TaskCompleted event.
    pub fn task_completed(batch_id: BatchId, outcome: &TaskOutcome, progress: (u32, u32)) -> Self {
        let mut metadata = progress_metadata(progress);
        metadata.insert("message".to_string(), outcome.message.clone());
        metadata.insert("duration_secs".to_string(), outcome.duration_secs.to_string());
        Self::new(
            batch_id,
            BatchEventType::TaskCompleted,
            Some(outcome.index),
            metadata,
        )
    }

    /// Create a TaskFailed event.
    pub fn task_failed(batch_id: BatchId, failure: &TaskFailure, progress: (u32, u32)) -> Self {
        let mut metadata = progress_metadata(progress);
        metadata.insert("error".to_string(), failure.error.to_string());
        Self::new(
            batch_id,
            BatchEventType::TaskFailed,
            Some(failure.index),
            metadata,
        )
    }

    /// Create a BatchFinished event.
    pub fn batch_finished(result: &BatchResult) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("submitted".to_string(), result.submitted.to_string());
        metadata.insert("succeeded".to_string(), result.succeeded.to_string());
        metadata.insert("failed".to_string(), result.failed.to_string());
        metadata.insert(
            "total_duration_secs".to_string(),
            result.total_duration_secs.to_string(),
        );
        metadata.insert(
            "wall_clock_ms".to_string(),
            result.wall_clock.as_millis().to_string(),
        );
        Self::new(
            result.batch_id.clone(),
            BatchEventType::BatchFinished,
            None,
            metadata,
        )
    }
}

fn progress_metadata((drained, total): (u32, u32)) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("drained".to_string(), drained.to_string());
    metadata.insert("total".to_string(), total.to_string());
    metadata
}

/// Type of batch event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchEventType {
    /// A task produced an outcome.
    TaskCompleted,
    /// A task failed.
    TaskFailed,
    /// Every task was drained.
    BatchFinished,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskError;
    use std::time::Duration;

    #[test]
    fn test_task_completed() {
        let outcome = TaskOutcome::new(2, 17, "Hello from task 2 (slept for 17s)");
        let event = BatchEvent::task_completed(BatchId::new("b"), &outcome, (1, 10));

        assert_eq!(event.event_type, BatchEventType::TaskCompleted);
        assert_eq!(event.task_index, Some(2));
        assert_eq!(event.metadata.get("duration_secs"), Some(&"17".to_string()));
        assert_eq!(event.metadata.get("drained"), Some(&"1".to_string()));
        assert!(event.timestamp_ms > 0);
    }

    #[test]
    fn test_task_failed() {
        let failure = TaskFailure::new(1, TaskError::Workload("disk full".into()));
        let event = BatchEvent::task_failed(BatchId::new("b"), &failure, (3, 3));

        assert_eq!(event.event_type, BatchEventType::TaskFailed);
        assert_eq!(
            event.metadata.get("error"),
            Some(&"Workload error: disk full".to_string())
        );
    }

    #[test]
    fn test_batch_finished_serializes_without_index() {
        let mut result = BatchResult::new(BatchId::new("b"), 3);
        result.succeeded = 3;
        result.total_duration_secs = 6;
        result.wall_clock = Duration::from_millis(2_005);

        let event = BatchEvent::batch_finished(&result);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "batch_finished");
        assert!(json.get("task_index").is_none());
        assert_eq!(json["metadata"]["wall_clock_ms"], "2005");
    }
}
