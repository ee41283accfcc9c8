use core::num::NonZeroU32;
use parking_lot::Mutex;

/// The remaining quantity of one order, shared by all of its workers.
///
/// This wraps the counter in a [`Mutex`] so that every read-modify-write is
/// exclusive. The counter itself is never exposed; workers can only shrink it
/// through [`Self::claim`].
///
/// ## Invariants
///
/// - `remaining` never goes below zero and never increases.
/// - The sum of all successful claims equals `order_size - remaining`.
///
/// Claims are not fair: a worker that claims more often, or with a larger
/// capacity, takes a larger share of the order.
#[derive(Debug)]
pub struct WorkPool {
    remaining: Mutex<u32>,
}

impl WorkPool {
    /// Creates a pool holding the full `order_size`.
    pub fn new(order_size: u32) -> Self {
        Self {
            remaining: Mutex::new(order_size),
        }
    }

    /// Atomically takes up to `max` units from the pool.
    ///
    /// Returns the number of units actually taken, which is
    /// `min(remaining, max)`. Returns `0` once the pool is exhausted.
    ///
    /// # Example
    /// ```
    /// use core::num::NonZeroU32;
    /// use plantline::server::pool::work::WorkPool;
    ///
    /// let pool = WorkPool::new(70);
    /// let cap = NonZeroU32::new(50).unwrap();
    ///
    /// assert_eq!(pool.claim(cap), 50);
    /// assert_eq!(pool.claim(cap), 20);
    /// assert_eq!(pool.claim(cap), 0);
    /// ```
    #[tracing::instrument(level = "trace", skip(self), ret)]
    pub fn claim(&self, max: NonZeroU32) -> u32 {
        let mut remaining = self.remaining.lock();
        let taken = (*remaining).min(max.get());
        *remaining -= taken;
        taken
    }

    /// Returns `true` if nothing is left to claim.
    ///
    /// The answer may be stale as soon as the lock is released, so this is
    /// only advisory. Decisions to produce are made on the result of
    /// [`Self::claim`].
    pub fn is_exhausted(&self) -> bool {
        *self.remaining.lock() == 0
    }

    /// Units not yet claimed.
    pub fn remaining(&self) -> u32 {
        *self.remaining.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread::scope;

    fn cap(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn claims_drain_in_capacity_sized_chunks() {
        let pool = WorkPool::new(100);

        assert_eq!(pool.claim(cap(30)), 30);
        assert_eq!(pool.claim(cap(30)), 30);
        assert_eq!(pool.claim(cap(30)), 30);
        assert_eq!(pool.remaining(), 10);
        assert!(!pool.is_exhausted());

        assert_eq!(pool.claim(cap(30)), 10);
        assert!(pool.is_exhausted());
        assert_eq!(pool.claim(cap(30)), 0);
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn capacity_above_remaining_takes_exactly_remaining() {
        let pool = WorkPool::new(7);
        assert_eq!(pool.claim(cap(u32::MAX)), 7);
        assert_eq!(pool.claim(cap(u32::MAX)), 0);
    }

    #[test]
    fn empty_order_is_exhausted_immediately() {
        let pool = WorkPool::new(0);
        assert!(pool.is_exhausted());
        assert_eq!(pool.claim(cap(1)), 0);
    }

    #[test]
    fn concurrent_claims_never_over_allocate() {
        const ORDER: u32 = 100_003;
        const THREADS: u32 = 8;

        let pool = WorkPool::new(ORDER);
        let claimed = AtomicU64::new(0);

        scope(|s| {
            for t in 0..THREADS {
                let pool = &pool;
                let claimed = &claimed;
                s.spawn(move || {
                    let capacity = cap(t + 1);
                    loop {
                        let taken = pool.claim(capacity);
                        assert!(taken <= capacity.get());
                        if taken == 0 {
                            break;
                        }
                        claimed.fetch_add(u64::from(taken), Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(claimed.load(Ordering::Relaxed), u64::from(ORDER));
        assert_eq!(pool.remaining(), 0);
    }
}
