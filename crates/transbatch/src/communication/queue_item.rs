use super::batch_item::Batch;

/// # QueueItem
///
/// What travels through the bounded queue from the batcher to the workers.
///
/// ## Shutdown
///
/// `Poison` carries no work. A worker that consumes one exits its loop, so
/// stopping a pool of N workers takes exactly N poison items. Poison is
/// queued behind whatever work is already waiting, which therefore drains
/// first.
pub enum QueueItem {
    Batch(Batch),
    Poison,
}

impl QueueItem {
    pub fn is_poison(&self) -> bool {
        matches!(self, QueueItem::Poison)
    }
}

impl From<Batch> for QueueItem {
    fn from(batch: Batch) -> Self {
        QueueItem::Batch(batch)
    }
}
