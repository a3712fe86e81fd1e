use std::sync::Arc;
use crate::backend::Segment;
use crate::request::{Request, RequestId};

/// # BatchEntry
///
/// One segment scheduled for translation: the request it belongs to and its
/// position inside that request.
///
/// The entry keeps the request alive until the worker has recorded the
/// segment's outcome, after which the batch is dropped.
#[derive(Clone)]
pub struct BatchEntry {
    request: Arc<Request>,
    index: usize,
}

impl BatchEntry {
    pub(crate) fn new(request: Arc<Request>, index: usize) -> Self {
        Self { request, index }
    }

    pub fn request_id(&self) -> RequestId {
        self.request.id()
    }

    /// Position of the segment within its request
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn segment(&self) -> &Segment {
        self.request.segment(self.index)
    }

    /// The source text the segment was produced from
    pub fn source(&self) -> &str {
        self.request.segment_source(self.index)
    }

    pub(crate) fn request(&self) -> &Arc<Request> {
        &self.request
    }
}

/// # Batch
///
/// Segments grouped for one engine invocation. Entries may come from several
/// requests; engines must answer them in order.
#[derive(Clone, Default)]
pub struct Batch {
    entries: Vec<BatchEntry>,
    tokens: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: BatchEntry) {
        self.tokens += entry.segment().len();
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub(crate) fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().map(|entry| entry.segment())
    }

    /// Total tokens across all entries
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
