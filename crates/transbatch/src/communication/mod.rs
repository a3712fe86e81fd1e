mod batch_item;
mod queue_item;

pub use batch_item::{Batch, BatchEntry};
pub use queue_item::QueueItem;
