use crate::{
    server::pool::work::WorkPool,
    telemetry::increment_parts_claimed,
    transport::{DatagramSink, PeerLink},
};
use core::{num::NonZeroU32, time::Duration};
use plantline_core::{Message, Result, types::WorkerId};
use std::sync::Arc;
use tokio::time::sleep;

/// Static description of one worker for one order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSpec {
    /// Worker number, `1..=N`.
    pub id: WorkerId,
    /// Upper bound on the parts claimed per iteration.
    pub capacity: NonZeroU32,
    /// Simulated production time per iteration.
    pub duration: Duration,
}

impl WorkerSpec {
    /// Production time as carried on the wire, saturating at `u32::MAX` ms.
    pub fn duration_ms(&self) -> u32 {
        u32::try_from(self.duration.as_millis()).unwrap_or(u32::MAX)
    }
}

/// What a worker did, handed back to the controller once it has joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: WorkerId,
    pub parts_made: u32,
    pub iterations: u32,
}

/// Worker task that drains the shared [`WorkPool`] for one order.
///
/// Each iteration claims up to `spec.capacity` parts, sleeps for
/// `spec.duration` to model production (with no lock held), then reports the
/// chunk to the buyer. The loop ends the first time a claim comes back empty,
/// after which exactly one completion notice is sent.
///
/// This function is designed to be spawned as a Tokio task. It owns its
/// accumulators until it returns them in the [`WorkerReport`].
///
/// # Errors
///
/// Returns a transport error if a message cannot be sent. The worker stops at
/// the first failed send.
pub async fn worker_loop<S: DatagramSink>(
    spec: WorkerSpec,
    pool: Arc<WorkPool>,
    link: PeerLink<S>,
) -> Result<WorkerReport> {
    tracing::trace!(
        "Worker {} started (capacity {}, {:?})",
        spec.id,
        spec.capacity,
        spec.duration
    );

    let mut report = WorkerReport {
        id: spec.id,
        ..WorkerReport::default()
    };

    loop {
        let to_make = pool.claim(spec.capacity);
        if to_make == 0 {
            break;
        }

        report.parts_made += to_make;
        report.iterations += 1;
        increment_parts_claimed(u64::from(to_make));

        tracing::debug!(
            "Worker # {:2}: Going to make {:5} parts in {:4} mSec",
            spec.id,
            to_make,
            spec.duration_ms()
        );

        if !spec.duration.is_zero() {
            sleep(spec.duration).await;
        }

        link.send(Message::Progress {
            worker_id: spec.id,
            capacity: spec.capacity.get(),
            parts_made: to_make,
            duration_ms: spec.duration_ms(),
        })
        .await?;
    }

    link.send(Message::Completion { worker_id: spec.id }).await?;

    tracing::info!(
        ">>> Worker # {:<3}: Terminating after making total of {:<5} parts in {:<4} iterations",
        spec.id,
        report.parts_made,
        report.iterations
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{MemoryTransport, addr};
    use plantline_core::Error;

    fn spec(id: WorkerId, capacity: u32) -> WorkerSpec {
        WorkerSpec {
            id,
            capacity: NonZeroU32::new(capacity).unwrap(),
            duration: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn single_worker_drains_order_then_completes_once() {
        let transport = Arc::new(MemoryTransport::new());
        let pool = Arc::new(WorkPool::new(100));
        let link = PeerLink::new(Arc::clone(&transport), addr(7000));

        let report = worker_loop(spec(1, 30), Arc::clone(&pool), link)
            .await
            .unwrap();

        assert_eq!(
            report,
            WorkerReport {
                id: 1,
                parts_made: 100,
                iterations: 4
            }
        );
        assert!(pool.is_exhausted());

        let progress = |parts_made| Message::Progress {
            worker_id: 1,
            capacity: 30,
            parts_made,
            duration_ms: 0,
        };
        assert_eq!(
            transport.sent_messages(),
            vec![
                progress(30),
                progress(30),
                progress(30),
                progress(10),
                Message::Completion { worker_id: 1 },
            ]
        );
        assert!(transport.sent().iter().all(|(_, to)| *to == addr(7000)));
    }

    #[tokio::test]
    async fn capacity_above_remaining_claims_exactly_remaining() {
        let transport = Arc::new(MemoryTransport::new());
        let pool = Arc::new(WorkPool::new(12));
        let link = PeerLink::new(Arc::clone(&transport), addr(7000));

        let report = worker_loop(spec(4, 50), pool, link).await.unwrap();

        assert_eq!(report.parts_made, 12);
        assert_eq!(report.iterations, 1);
        assert_eq!(
            transport.sent_messages(),
            vec![
                Message::Progress {
                    worker_id: 4,
                    capacity: 50,
                    parts_made: 12,
                    duration_ms: 0,
                },
                Message::Completion { worker_id: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_pool_sends_only_completion() {
        let transport = Arc::new(MemoryTransport::new());
        let link = PeerLink::new(Arc::clone(&transport), addr(7000));

        let report = worker_loop(spec(2, 5), Arc::new(WorkPool::new(0)), link)
            .await
            .unwrap();

        assert_eq!(report.parts_made, 0);
        assert_eq!(report.iterations, 0);
        assert_eq!(
            transport.sent_messages(),
            vec![Message::Completion { worker_id: 2 }]
        );
    }

    #[tokio::test]
    async fn send_failure_stops_the_worker() {
        let transport = Arc::new(MemoryTransport::failing());
        let link = PeerLink::new(transport, addr(7000));

        let err = worker_loop(spec(1, 5), Arc::new(WorkPool::new(20)), link)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_share_the_order() {
        let transport = Arc::new(MemoryTransport::new());
        let pool = Arc::new(WorkPool::new(1_000));

        let handles: Vec<_> = (1..=5)
            .map(|id| {
                let link = PeerLink::new(Arc::clone(&transport), addr(7000));
                let spec = WorkerSpec {
                    duration: Duration::from_millis(1),
                    ..spec(id, 7 * id)
                };
                tokio::spawn(worker_loop(spec, Arc::clone(&pool), link))
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap().unwrap().parts_made;
        }
        assert_eq!(total, 1_000);

        let sent = transport.sent_messages();
        let completions = sent
            .iter()
            .filter(|m| matches!(m, Message::Completion { .. }))
            .count();
        let progress_total: u32 = sent
            .iter()
            .filter_map(|m| match m {
                Message::Progress { parts_made, .. } => Some(*parts_made),
                _ => None,
            })
            .sum();
        assert_eq!(completions, 5);
        assert_eq!(progress_total, 1_000);
    }
}
