//! Completion-order draining over a set of task handles.

use std::pin::Pin;
use std::task::{Context, Poll};

use bagrun_core::Completion;
use futures_util::stream::{FusedStream, FuturesUnordered, Stream, StreamExt};

use crate::backend::TaskHandle;

/// Yields each handle's completion as soon as it resolves.
///
/// Takes the handles by value, so a batch can only be drained once. Polling
/// parks until some handle wakes it; nothing spins while workers run.
pub struct AsCompleted {
    pending: FuturesUnordered<TaskHandle>,
    total: usize,
}

impl AsCompleted {
    /// Start draining `handles`.
    pub fn new(handles: impl IntoIterator<Item = TaskHandle>) -> Self {
        let pending: FuturesUnordered<TaskHandle> = handles.into_iter().collect();
        let total = pending.len();
        Self { pending, total }
    }

    /// Handles not yet resolved.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Handles this drain started with.
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Drain `handles` in completion order.
pub fn as_completed(handles: impl IntoIterator<Item = TaskHandle>) -> AsCompleted {
    AsCompleted::new(handles)
}

impl Stream for AsCompleted {
    type Item = Completion;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.pending.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pending.len();
        (remaining, Some(remaining))
    }
}

impl FusedStream for AsCompleted {
    fn is_terminated(&self) -> bool {
        self.pending.is_terminated()
    }
}
