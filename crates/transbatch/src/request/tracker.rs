use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::oneshot;
use crate::response::Response;
use super::item::ResponseFuture;
use super::request::Completion;
use super::RequestId;

/// Lifecycle of a tracked request.
///
/// `Pending` and `Queued` are transient; every other state is terminal and
/// never changes once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Admitted, not yet handed to the batcher
    Pending = 0,
    /// Segments registered with the batcher
    Queued = 1,
    /// Resolved with an empty response by cancellation or shutdown
    Cancelled = 2,
    Success = 3,
    /// Input larger than the capacity available at submission
    RejectedMemory = 4,
    /// Text processing or an engine batch failed
    Failed = 5,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending | Status::Queued)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Status::Pending,
            1 => Status::Queued,
            2 => Status::Cancelled,
            3 => Status::Success,
            4 => Status::RejectedMemory,
            _ => Status::Failed,
        }
    }
}

impl From<Completion> for Status {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Translated => Status::Success,
            Completion::Failed => Status::Failed,
            Completion::Cancelled => Status::Cancelled,
        }
    }
}

/// Cloneable view of a tracked request: its id and status.
///
/// Holds no reference to the request itself. Cancel and amend locate the
/// request by id in the batcher, so a handle never keeps a finished request
/// alive.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    inner: Arc<TrackerState>,
}

#[derive(Debug)]
struct TrackerState {
    id: RequestId,
    status: AtomicU8,
}

impl TrackerHandle {
    pub(crate) fn new(id: RequestId) -> Self {
        Self {
            inner: Arc::new(TrackerState {
                id,
                status: AtomicU8::new(Status::Pending as u8),
            }),
        }
    }

    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    /// Moves to `status` unless a terminal state was already reached.
    ///
    /// Returns whether the status changed.
    pub(crate) fn set_status(&self, status: Status) -> bool {
        self.inner
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = Status::from_u8(current);
                if current.is_terminal() || current == status {
                    None
                } else {
                    Some(status as u8)
                }
            })
            .is_ok()
    }
}

impl AsRef<TrackerHandle> for TrackerHandle {
    fn as_ref(&self) -> &TrackerHandle {
        self
    }
}

/// # RequestTracker
///
/// Returned by [`crate::Service::translate_part`]. Awaiting the tracker (it
/// implements [`IntoFuture`]) yields the response; [`RequestTracker::handle`]
/// gives a handle that outlives the await for status queries, cancel and
/// amend.
pub struct RequestTracker {
    handle: TrackerHandle,
    future: ResponseFuture,
}

impl RequestTracker {
    /// Creates a pending tracker and the promise that resolves it.
    pub(crate) fn new(id: RequestId) -> (Self, oneshot::Sender<Response>) {
        let (promise, receiver) = oneshot::channel();
        let tracker = Self {
            handle: TrackerHandle::new(id),
            future: ResponseFuture::new(id, receiver),
        };
        (tracker, promise)
    }

    pub fn id(&self) -> RequestId {
        self.handle.id()
    }

    pub fn status(&self) -> Status {
        self.handle.status()
    }

    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Splits the tracker into its handle and the response future.
    pub fn into_parts(self) -> (TrackerHandle, ResponseFuture) {
        (self.handle, self.future)
    }
}

impl AsRef<TrackerHandle> for RequestTracker {
    fn as_ref(&self) -> &TrackerHandle {
        &self.handle
    }
}

impl IntoFuture for RequestTracker {
    type Output = <ResponseFuture as std::future::Future>::Output;
    type IntoFuture = ResponseFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}
