use std::ops::Range;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::oneshot;
use crate::backend::{Processed, Segment};
use crate::response::{Response, SegmentOutcome};
use super::RequestId;

/// How a request ended, handed to its completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every segment that was not cancelled got a translation
    Translated,

    /// At least one segment's batch failed in the engine
    Failed,

    /// No segment was ever dispatched; all were cancelled
    Cancelled,
}

type CompletionCallback = Box<dyn FnOnce(Completion) + Send>;

struct Progress {
    outcomes: Vec<Option<SegmentOutcome>>,
    remaining: usize,
    on_complete: Option<CompletionCallback>,
    promise: Option<oneshot::Sender<Response>>,
    finished: bool,
}

/// One submitted text, split into segments, in flight through the batcher
/// and the workers.
///
/// Shared via `Arc` between the batcher's registry and every batch holding
/// one of its segments. The request resolves exactly once: when the last
/// outstanding segment is translated, failed or cancelled, the completion
/// callback runs and then the response is sent.
pub struct Request {
    id: RequestId,
    line_number_begin: usize,
    nice: AtomicI32,
    source: String,
    segments: Vec<Segment>,
    source_ranges: Vec<Range<usize>>,
    progress: Mutex<Progress>,
}

impl Request {
    pub fn new(
        id: RequestId,
        line_number_begin: usize,
        nice: i32,
        source: String,
        processed: Processed,
        promise: oneshot::Sender<Response>,
    ) -> Self {
        let Processed { segments, source_ranges } = processed;
        let count = segments.len();
        Self {
            id,
            line_number_begin,
            nice: AtomicI32::new(nice),
            source,
            segments,
            source_ranges,
            progress: Mutex::new(Progress {
                outcomes: vec![None; count],
                remaining: count,
                on_complete: None,
                promise: Some(promise),
                finished: false,
            }),
        }
    }

    /// Registers the callback run when the request completes, before the
    /// response is delivered.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.progress().on_complete = Some(Box::new(callback));
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn nice(&self) -> i32 {
        self.nice.load(Ordering::Acquire)
    }

    pub(crate) fn set_nice(&self, nice: i32) {
        self.nice.store(nice, Ordering::Release);
    }

    pub fn line_number_begin(&self) -> usize {
        self.line_number_begin
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> &Segment {
        &self.segments[index]
    }

    /// Source text covered by segment `index`, empty if the processor
    /// reported a range outside the input.
    pub fn segment_source(&self, index: usize) -> &str {
        self.source_ranges
            .get(index)
            .and_then(|range| self.source.get(range.clone()))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments not yet translated, failed or cancelled
    pub fn remaining(&self) -> usize {
        self.progress().remaining
    }

    pub fn is_finished(&self) -> bool {
        self.progress().finished
    }

    pub(crate) fn translated(&self, index: usize, translation: String) {
        self.record(&[index], || SegmentOutcome::Translated(translation.clone()));
    }

    pub(crate) fn failed(&self, index: usize, reason: &str) {
        self.record(&[index], || SegmentOutcome::Failed(reason.to_string()));
    }

    pub(crate) fn cancel_segments(&self, indices: &[usize]) {
        self.record(indices, || SegmentOutcome::Cancelled);
    }

    pub(crate) fn cancel_all(&self) {
        let indices = (0..self.segments.len()).collect::<Vec<_>>();
        self.cancel_segments(&indices);
    }

    /// Resolves a request that has nothing left to wait for. Needed for
    /// requests without segments, which no worker will ever touch.
    pub(crate) fn finish_if_idle(&self) {
        let progress = self.progress();
        if progress.remaining == 0 && !progress.finished {
            self.finish(progress);
        }
    }

    fn record<F>(&self, indices: &[usize], outcome: F)
    where
        F: Fn() -> SegmentOutcome,
    {
        let mut guard = self.progress();
        let progress = &mut *guard;
        if progress.finished {
            return;
        }
        for &index in indices {
            if let Some(slot) = progress.outcomes.get_mut(index) {
                if slot.is_none() {
                    *slot = Some(outcome());
                    progress.remaining -= 1;
                }
            }
        }
        if progress.remaining == 0 {
            self.finish(guard);
        }
    }

    fn finish(&self, mut progress: MutexGuard<'_, Progress>) {
        progress.finished = true;
        let outcomes = std::mem::take(&mut progress.outcomes)
            .into_iter()
            .map(|outcome| outcome.unwrap_or(SegmentOutcome::Cancelled))
            .collect::<Vec<_>>();
        let on_complete = progress.on_complete.take();
        let promise = progress.promise.take();
        drop(progress);

        let all_cancelled = !outcomes.is_empty()
            && outcomes.iter().all(|o| matches!(o, SegmentOutcome::Cancelled));
        let any_failed = outcomes.iter().any(|o| matches!(o, SegmentOutcome::Failed(_)));

        let (completion, response) = if all_cancelled {
            (Completion::Cancelled, Response::empty())
        } else {
            let completion = if any_failed { Completion::Failed } else { Completion::Translated };
            let response = Response::assemble(
                &self.source,
                &self.segments,
                &self.source_ranges,
                outcomes,
                self.line_number_begin,
            );
            (completion, response)
        };

        if let Some(callback) = on_complete {
            callback(completion);
        }
        if let Some(promise) = promise {
            // the caller may have dropped its future
            let _ = promise.send(response);
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
