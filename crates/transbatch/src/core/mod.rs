//! # Core Serving Machinery
//!
//! The pieces the [`crate::Service`] coordinates between callers and engines.
//!
//! ## Module Structure
//!
//! * [`capacity`] - The process-wide byte budget used for admission control.
//!
//! * [`batcher`] - Holds every admitted segment that has not been dispatched yet
//!   and groups them into batches by priority, arrival and token budget.
//!   Cancel and amend act on this pending state.
//!
//! * [`queue`] - A fixed-capacity FIFO between the batcher and the workers.
//!   A full queue makes producers wait, which is the service's back-pressure.
//!
//! * [`worker`] - The worker pool: one engine per worker, each consuming
//!   batches until it receives a poison item.
//!
//! ## Flow
//!
//! ```text
//! translate -> Capacity -> Batcher -> BoundedQueue -> WorkerPool -> engine
//!                 ^                                                   |
//!                 +---------------- completion callback --------------+
//! ```
pub mod batcher;
pub mod capacity;
pub mod queue;
pub mod worker;
