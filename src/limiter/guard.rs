//! RAII guard that releases an in-flight slot when dropped.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::SemaphorePermit;

/// Holds an admitted call's semaphore permit and in-flight count.
///
/// Dropping it (operation settled, failed, panicked or was cancelled)
/// decrements the count and returns the permit exactly once.
pub(super) struct InFlightGuard<'a> {
    pub(super) in_flight: &'a AtomicUsize,
    pub(super) _permit: SemaphorePermit<'a>,
}

impl<'a> InFlightGuard<'a> {
    pub(super) fn admit(in_flight: &'a AtomicUsize, permit: SemaphorePermit<'a>) -> Self {
        in_flight.fetch_add(1, Ordering::AcqRel);
        Self {
            in_flight,
            _permit: permit,
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
