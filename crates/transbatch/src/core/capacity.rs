use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide admission budget in bytes.
///
/// Reservation is a single compare-and-swap loop, so two concurrent
/// admissions can never both succeed against the same remaining bytes.
#[derive(Debug)]
pub struct Capacity {
    /// Configured budget, never exceeded by `available`
    limit: usize,

    /// Bytes still available for admission
    available: AtomicUsize,
}

impl Capacity {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            available: AtomicUsize::new(limit),
        }
    }

    /// Attempts to take `bytes` out of the budget.
    ///
    /// Returns `false`, leaving the budget untouched, when fewer than `bytes`
    /// are available.
    pub fn try_reserve(&self, bytes: usize) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| current.checked_sub(bytes))
            .is_ok()
    }

    /// Returns `bytes` previously taken by [`Capacity::try_reserve`].
    ///
    /// Releasing more than was reserved is a bug; debug builds panic on it,
    /// release builds clamp at the limit.
    pub fn release(&self, bytes: usize) {
        let limit = self.limit;
        let previous = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(bytes).min(limit))
            })
            .unwrap_or_else(|current| current);
        debug_assert!(
            previous.saturating_add(bytes) <= limit,
            "released {bytes} bytes with {previous} of {limit} already available"
        );
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
