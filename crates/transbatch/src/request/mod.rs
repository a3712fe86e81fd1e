//! Request lifecycle: the in-flight [`Request`], the caller-side
//! [`RequestTracker`] and the [`ResponseFuture`] they share.

mod item;
#[allow(clippy::module_inception)]
mod request;
mod tracker;

/// Service-assigned request identifier. Monotonically increasing, never reused.
pub type RequestId = u64;

pub use item::ResponseFuture;
pub use request::{Completion, Request};
pub use tracker::{RequestTracker, Status, TrackerHandle};
