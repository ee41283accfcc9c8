//! Property-based tests for the shared work pool.
//!
//! These check that claims never over-allocate, that the remaining quantity
//! only shrinks, and that every order is drained exactly, including under
//! real thread contention.

use core::num::NonZeroU32;
use plantline::server::pool::work::WorkPool;
use proptest::prelude::*;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread::scope,
};

fn arb_capacity() -> impl Strategy<Value = NonZeroU32> {
    (1u32..=200).prop_map(|n| NonZeroU32::new(n).unwrap())
}

proptest! {
    /// Property: a claim takes `min(remaining, max)` and nothing else
    #[test]
    fn claim_is_bounded_and_monotonic(
        order_size in 0u32..=10_000,
        capacities in prop::collection::vec(arb_capacity(), 1..64),
    ) {
        let pool = WorkPool::new(order_size);
        let mut claimed = 0u64;

        for capacity in capacities {
            let before = pool.remaining();
            let taken = pool.claim(capacity);
            let after = pool.remaining();

            prop_assert_eq!(taken, before.min(capacity.get()));
            prop_assert_eq!(after, before - taken);
            claimed += u64::from(taken);
        }

        prop_assert_eq!(claimed + u64::from(pool.remaining()), u64::from(order_size));
    }

    /// Property: a single capacity drains any order in `ceil(S / C)` claims
    #[test]
    fn single_claimer_drains_exactly(order_size in 0u32..=50_000, capacity in arb_capacity()) {
        let pool = WorkPool::new(order_size);
        let mut total = 0u64;
        let mut claims = 0u32;

        loop {
            let taken = pool.claim(capacity);
            if taken == 0 {
                break;
            }
            total += u64::from(taken);
            claims += 1;
        }

        prop_assert_eq!(total, u64::from(order_size));
        prop_assert_eq!(claims, order_size.div_ceil(capacity.get()));
        prop_assert!(pool.is_exhausted());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: concurrent claimers never over-allocate and jointly drain
    /// the whole order
    #[test]
    fn concurrent_claims_sum_to_order(
        order_size in 0u32..=20_000,
        capacities in prop::collection::vec(arb_capacity(), 1..=8),
    ) {
        let pool = WorkPool::new(order_size);
        let claimed = AtomicU64::new(0);

        scope(|s| {
            for &capacity in &capacities {
                let pool = &pool;
                let claimed = &claimed;
                s.spawn(move || loop {
                    let taken = pool.claim(capacity);
                    assert!(taken <= capacity.get());
                    if taken == 0 {
                        break;
                    }
                    claimed.fetch_add(u64::from(taken), Ordering::Relaxed);
                });
            }
        });

        prop_assert_eq!(claimed.load(Ordering::Relaxed), u64::from(order_size));
        prop_assert_eq!(pool.remaining(), 0);
    }
}
