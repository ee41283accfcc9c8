use crate::{
    client::aggregator::{Aggregator, ProcurementReport, Step},
    transport::{DatagramSink, DatagramSource, recv_message, send_message},
};
use core::time::Duration;
use plantline_core::{Error, Message, Result, types::MAX_WORKERS};
use std::{net::SocketAddr, sync::Arc};
use tokio::time::timeout;

/// Places orders with one plant and collects the results.
///
/// Every receive is bounded by `timeout`, so a plant that dies without
/// sending PROTOCOL_ERR surfaces as [`Error::Timeout`] instead of a hang.
pub struct Buyer<T> {
    transport: Arc<T>,
    plant: SocketAddr,
    timeout: Duration,
}

impl<T> Buyer<T>
where
    T: DatagramSink + DatagramSource,
{
    pub const fn new(transport: Arc<T>, plant: SocketAddr, timeout: Duration) -> Self {
        Self {
            transport,
            plant,
            timeout,
        }
    }

    /// Sends a REQUEST for `order_size` parts and follows the session until
    /// every confirmed worker has completed.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionAborted`] if the plant sends PROTOCOL_ERR.
    /// - [`Error::Timeout`] if the plant goes quiet.
    /// - [`Error::Transport`] on socket failures.
    #[tracing::instrument(skip(self), fields(plant = %self.plant))]
    pub async fn place_order(&self, order_size: u32) -> Result<ProcurementReport> {
        let request = Message::Request { order_size };
        send_message(&*self.transport, &request, self.plant).await?;
        tracing::info!("PROCUREMENT sent {request:?} to the plant");

        let num_workers = self.await_confirm().await?;
        tracing::info!("PROCUREMENT order confirmed with {num_workers} workers");

        let mut aggregator = Aggregator::new(order_size, num_workers);
        while !aggregator.is_finished() {
            let message = self.next_message().await?;
            if let Step::Finished = aggregator.apply(message)? {
                break;
            }
        }

        Ok(aggregator.into_report())
    }

    async fn await_confirm(&self) -> Result<u32> {
        tracing::info!("PROCUREMENT is now waiting for order confirmation ...");
        loop {
            match self.next_message().await? {
                Message::Confirm { num_workers } if num_workers <= MAX_WORKERS => {
                    return Ok(num_workers);
                }
                Message::Confirm { num_workers } => tracing::warn!(
                    "Ignoring confirmation for {num_workers} workers (limit is {MAX_WORKERS})"
                ),
                Message::ProtocolError => return Err(Error::SessionAborted),
                other => tracing::warn!("Ignoring {other:?} while awaiting confirmation"),
            }
        }
    }

    /// Next well-formed message, skipping malformed datagrams.
    async fn next_message(&self) -> Result<Message> {
        loop {
            let received = timeout(self.timeout, recv_message(&*self.transport))
                .await
                .map_err(|_| Error::Timeout {
                    waited: self.timeout,
                })?;

            match received {
                Ok((message, from)) => {
                    if from != self.plant {
                        tracing::debug!("Message from {from}, expected {}", self.plant);
                    }
                    return Ok(message);
                }
                Err(e) if e.is_recoverable() => tracing::warn!("Ignoring datagram: {e}"),
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{MemoryTransport, addr};

    fn progress(worker_id: u32, parts_made: u32) -> Message {
        Message::Progress {
            worker_id,
            capacity: 50,
            parts_made,
            duration_ms: 5,
        }
    }

    fn buyer(transport: &Arc<MemoryTransport>) -> Buyer<MemoryTransport> {
        Buyer::new(Arc::clone(transport), addr(50015), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn full_session_produces_report() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push(progress(1, 1), addr(50015));
        transport.push_raw(vec![0; 3], addr(50015));
        transport.push(Message::Confirm { num_workers: 2 }, addr(50015));
        transport.push(progress(1, 50), addr(50015));
        transport.push(progress(2, 30), addr(50015));
        transport.push(Message::Completion { worker_id: 2 }, addr(50015));
        transport.push(progress(1, 20), addr(50015));
        transport.push(Message::Completion { worker_id: 1 }, addr(50015));

        let report = buyer(&transport).place_order(100).await.unwrap();

        assert_eq!(
            transport.sent(),
            vec![(Message::Request { order_size: 100 }, addr(50015))]
        );
        assert_eq!(report.order_size, 100);
        assert_eq!(report.grand_total(), 100);
        assert_eq!(report.workers[&1].iterations, 2);
        assert_eq!(report.workers[&2].iterations, 1);
    }

    #[tokio::test]
    async fn oversized_confirm_is_ignored() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push(Message::Confirm { num_workers: u32::MAX }, addr(50015));
        transport.push(
            Message::Confirm {
                num_workers: MAX_WORKERS + 1,
            },
            addr(50015),
        );
        transport.push(Message::Confirm { num_workers: 1 }, addr(50015));
        transport.push(progress(1, 10), addr(50015));
        transport.push(Message::Completion { worker_id: 1 }, addr(50015));

        let report = buyer(&transport).place_order(10).await.unwrap();

        assert_eq!(report.workers.len(), 1);
        assert_eq!(report.grand_total(), 10);
    }

    #[tokio::test]
    async fn protocol_error_before_confirm_aborts() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push(Message::ProtocolError, addr(50015));

        let err = buyer(&transport).place_order(10).await.unwrap_err();
        assert!(matches!(err, Error::SessionAborted));
    }

    #[tokio::test]
    async fn protocol_error_mid_session_aborts() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push(Message::Confirm { num_workers: 3 }, addr(50015));
        transport.push(progress(1, 10), addr(50015));
        transport.push(Message::ProtocolError, addr(50015));

        let err = buyer(&transport).place_order(10).await.unwrap_err();
        assert!(matches!(err, Error::SessionAborted));
    }

    #[tokio::test]
    async fn zero_worker_confirm_finishes_empty() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push(Message::Confirm { num_workers: 0 }, addr(50015));

        let report = buyer(&transport).place_order(10).await.unwrap();
        assert!(report.workers.is_empty());
        assert!(report.is_short());
    }

    #[tokio::test]
    async fn silent_plant_times_out() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push(Message::Confirm { num_workers: 1 }, addr(50015));

        let err = buyer(&transport).place_order(10).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout { waited } if waited == Duration::from_millis(200)
        ));
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let transport = Arc::new(MemoryTransport::failing());
        let err = buyer(&transport).place_order(10).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
