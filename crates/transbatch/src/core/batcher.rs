//! Groups pending segments from any number of requests into batches.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use crate::communication::{Batch, BatchEntry, QueueItem};
use crate::config::BatchingConfig;
use crate::request::{Request, RequestId};
use super::queue::BoundedQueue;

/// Orders pending segments: lower `nice` first, then arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PendingKey {
    nice: i32,
    arrival: u64,
}

enum Registration {
    /// Admitted but not segmented yet. Cancel and amend are remembered here
    /// and applied when the request arrives.
    Reserved {
        nice: Option<i32>,
        cancelled: bool,
    },

    /// Segments waiting to be batched
    Active {
        request: Arc<Request>,
        pending: BTreeSet<PendingKey>,
    },
}

#[derive(Default)]
struct BatcherState {
    pending: BTreeMap<PendingKey, (Arc<Request>, usize)>,
    registry: HashMap<RequestId, Registration>,
    arrivals: u64,
}

/// Result of [`Batcher::add_whole_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Segments are pending
    Queued,

    /// The request has no segments; nothing was registered
    Empty,

    /// A cancel arrived while the request was still reserved; nothing was
    /// registered and the request should be resolved as cancelled
    Cancelled,
}

/// # Batcher
///
/// Owns every segment that is admitted but not yet dispatched, plus a
/// registry from request id to those segments. All four operations (add,
/// batch, cancel, amend) go through one short lock that is never held across
/// an await, so none of them suspends the caller.
pub struct Batcher {
    config: BatchingConfig,
    state: Mutex<BatcherState>,
}

impl Batcher {
    pub fn new(config: BatchingConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BatcherState::default()),
        }
    }

    /// Registers `id` ahead of its request so that a cancel or amend issued
    /// before segmentation finishes is not lost.
    pub fn reserve(&self, id: RequestId) {
        let mut state = self.state();
        state.registry.entry(id).or_insert(Registration::Reserved {
            nice: None,
            cancelled: false,
        });
    }

    /// Drops a reservation whose request will never be added.
    pub fn forget(&self, id: RequestId) {
        let mut state = self.state();
        if let Some(Registration::Reserved { .. }) = state.registry.get(&id) {
            state.registry.remove(&id);
        }
    }

    /// Makes every segment of `request` pending at the request's priority.
    pub fn add_whole_request(&self, request: Arc<Request>) -> Enqueued {
        let mut guard = self.state();
        let state = &mut *guard;
        let id = request.id();

        match state.registry.remove(&id) {
            Some(Registration::Reserved { cancelled: true, .. }) => return Enqueued::Cancelled,
            Some(Registration::Reserved { nice: Some(nice), .. }) => request.set_nice(nice),
            Some(active @ Registration::Active { .. }) => {
                debug!(request = id, "request already registered");
                state.registry.insert(id, active);
                return Enqueued::Queued;
            }
            _ => {}
        }
        if request.is_empty() {
            return Enqueued::Empty;
        }

        let nice = request.nice();
        let mut keys = BTreeSet::new();
        for index in 0..request.len() {
            let key = PendingKey {
                nice,
                arrival: state.arrivals,
            };
            state.arrivals += 1;
            state.pending.insert(key, (request.clone(), index));
            keys.insert(key);
        }
        debug!(request = id, segments = keys.len(), nice, "request added to batcher");
        state.registry.insert(id, Registration::Active {
            request,
            pending: keys,
        });
        Enqueued::Queued
    }

    /// Assembles one batch from the highest priority pending segments.
    ///
    /// Segments are taken in order until the next one would exceed the
    /// token or segment budget. A segment larger than the token budget is
    /// batched on its own. Returns `None` when nothing is pending.
    pub fn next_batch(&self) -> Option<Batch> {
        let mut guard = self.state();
        let state = &mut *guard;
        let mut batch = Batch::new();

        while let Some(entry) = state.pending.first_entry() {
            if batch.len() >= self.config.max_batch_segments {
                break;
            }
            let (request, index) = entry.get();
            let tokens = request.segment(*index).len();
            if !batch.is_empty() && batch.tokens() + tokens > self.config.max_batch_tokens {
                break;
            }

            let (key, (request, index)) = entry.remove_entry();
            Self::dispatched(&mut state.registry, request.id(), key);
            batch.push(BatchEntry::new(request, index));
        }

        if batch.is_empty() {
            None
        } else {
            debug!(segments = batch.len(), tokens = batch.tokens(), "batch assembled");
            Some(batch)
        }
    }

    /// Moves every pending segment into `queue`, batch by batch.
    ///
    /// Waits whenever the queue is full. Returns the number of batches pushed.
    pub async fn produce_to(&self, queue: &BoundedQueue<QueueItem>) -> usize {
        let mut produced = 0;
        while let Some(batch) = self.next_batch() {
            queue.produce(QueueItem::Batch(batch)).await;
            produced += 1;
        }
        produced
    }

    /// Withdraws the pending segments of request `id`.
    ///
    /// Returns the request and the indices removed, or `None` when nothing
    /// was pending (already dispatched, finished, or not yet segmented; in
    /// the last case the cancel is applied on arrival).
    pub fn cancel(&self, id: RequestId) -> Option<(Arc<Request>, Vec<usize>)> {
        let mut guard = self.state();
        let state = &mut *guard;

        match state.registry.remove(&id) {
            Some(Registration::Active { request, pending }) => {
                let indices = pending
                    .iter()
                    .filter_map(|key| state.pending.remove(key))
                    .map(|(_, index)| index)
                    .collect::<Vec<_>>();
                debug!(request = id, segments = indices.len(), "cancelled pending segments");
                Some((request, indices))
            }
            Some(Registration::Reserved { nice, .. }) => {
                state.registry.insert(id, Registration::Reserved { nice, cancelled: true });
                None
            }
            None => {
                debug!(request = id, "cancel ignored, nothing pending");
                None
            }
        }
    }

    /// Changes the priority of request `id`'s pending segments.
    ///
    /// Returns `false` when the request has nothing pending.
    pub fn amend(&self, id: RequestId, nice: i32) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;

        match state.registry.get_mut(&id) {
            Some(Registration::Reserved { nice: amended, .. }) => {
                *amended = Some(nice);
                true
            }
            Some(Registration::Active { request, pending }) => {
                request.set_nice(nice);
                let rekeyed = pending
                    .iter()
                    .filter_map(|key| {
                        let value = state.pending.remove(key)?;
                        let key = PendingKey { nice, arrival: key.arrival };
                        state.pending.insert(key, value);
                        Some(key)
                    })
                    .collect();
                *pending = rekeyed;
                debug!(request = id, nice, "amended priority");
                true
            }
            None => {
                debug!(request = id, "amend ignored, nothing pending");
                false
            }
        }
    }

    /// Number of segments waiting to be batched
    pub fn pending_segments(&self) -> usize {
        self.state().pending.len()
    }

    fn state(&self) -> MutexGuard<'_, BatcherState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatched(registry: &mut HashMap<RequestId, Registration>, id: RequestId, key: PendingKey) {
        if let Some(Registration::Active { pending, .. }) = registry.get_mut(&id) {
            pending.remove(&key);
            if pending.is_empty() {
                registry.remove(&id);
            }
        }
    }
}
