//! Fixed-capacity producer/consumer channel between the batcher and the workers.

use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;

/// A FIFO channel shared by many producers and many consumers.
///
/// `produce` waits while the queue is full, which is how a saturated worker
/// pool pushes back on the batcher. `consume` waits while it is empty.
/// Consumers take turns on the receiving half, so items are handed out in
/// the order they were produced.
pub struct BoundedQueue<T> {
    capacity: usize,
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            capacity,
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Appends `item`, waiting for room if the queue is full.
    pub async fn produce(&self, item: T) {
        // the receiver lives as long as `self`, so the channel never closes
        let _ = self.sender.send(item).await;
    }

    /// Appends `item` only if there is room right now.
    pub fn try_produce(&self, item: T) -> Result<(), T> {
        self.sender.try_send(item).map_err(|err| match err {
            TrySendError::Full(item) | TrySendError::Closed(item) => item,
        })
    }

    /// Removes the oldest item, waiting until one is available.
    pub async fn consume(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently waiting
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
