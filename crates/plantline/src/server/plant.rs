//! Plant session controller.
//!
//! This module defines [`Plant`], which owns the listening transport and runs
//! orders one at a time. For each REQUEST it captures the buyer's address,
//! confirms the worker count, spawns the workers against a fresh
//! [`WorkPool`], waits for all of them to join, and logs an
//! [`OrderSummary`]. Only then does it read the next datagram.
//!
//! ## Shutdown
//!
//! The controller observes a [`CancellationToken`]. When it fires while idle
//! the serve loop returns. When it fires mid-order the worker tasks are
//! aborted and joined, the buyer is sent a PROTOCOL_ERR (best effort) as the
//! last message of the order, and the loop returns
//! [`OrderOutcome::Interrupted`].

use crate::{
    server::{
        config::ServerConfig,
        pool::{
            work::WorkPool,
            worker::{WorkerReport, WorkerSpec, worker_loop},
        },
    },
    telemetry::{increment_orders_accepted, increment_orders_interrupted, record_order_duration},
    transport::{DatagramSink, DatagramSource, PeerLink, recv_message},
};
use core::time::Duration;
use futures::future::join_all;
use plantline_core::{Error, Message, Result};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Final account of one completed order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_size: u32,
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
}

impl OrderSummary {
    /// Sum of the parts made by every worker.
    pub fn grand_total(&self) -> u64 {
        self.workers.iter().map(|w| u64::from(w.parts_made)).sum()
    }

    fn log(&self) {
        tracing::info!("****** PLANT Summary Report ******");
        for w in &self.workers {
            tracing::info!(
                "Worker # {:2} made a total of {:5} parts in {:5} iterations",
                w.id,
                w.parts_made,
                w.iterations
            );
        }
        tracing::info!(
            "Grand total parts made = {:5} vs order size of {:5}",
            self.grand_total(),
            self.order_size
        );
        tracing::info!(
            "Order-to-completion time = {:.1} milliSeconds",
            self.elapsed.as_secs_f64() * 1000.0
        );
    }
}

/// How an order ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderOutcome {
    /// All workers reached completion.
    Completed(OrderSummary),
    /// Shutdown was requested before the workers finished.
    Interrupted,
}

/// Accepts orders on a transport and fulfils them with concurrent workers.
pub struct Plant<T> {
    transport: Arc<T>,
    config: ServerConfig,
}

impl<T> Plant<T>
where
    T: DatagramSink + DatagramSource,
{
    pub const fn new(transport: Arc<T>, config: ServerConfig) -> Self {
        Self { transport, config }
    }

    /// Serves orders until `shutdown` is cancelled.
    ///
    /// Datagrams that are malformed, or that are not REQUESTs, are logged and
    /// skipped. REQUESTs that arrive while an order is running stay queued on
    /// the socket and are served after it.
    ///
    /// # Errors
    ///
    /// Returns the first transport fault (receive or send failure) or a
    /// [`Error::WorkerFailed`] if a worker task dies.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<()> {
        loop {
            tracing::info!("PLANT waiting for order requests");

            let received = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested while idle");
                    return Ok(());
                }
                received = recv_message(&*self.transport) => received,
            };

            let (message, peer) = match received {
                Ok(received) => received,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Ignoring datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let Message::Request { order_size } = message else {
                tracing::warn!("Ignoring {message:?} from {peer} while idle");
                continue;
            };

            tracing::info!(
                "PLANT received an order for {order_size} parts from IP {} Port {}",
                peer.ip(),
                peer.port()
            );

            let specs = self.config.plan_workers();
            match self.run_order(order_size, peer, specs, &shutdown).await? {
                OrderOutcome::Completed(summary) => summary.log(),
                OrderOutcome::Interrupted => return Ok(()),
            }
        }
    }

    /// Runs one order to completion (or interruption).
    ///
    /// Sends CONFIRM with `specs.len()` workers, spawns one task per spec,
    /// and waits for all of them. Every worker reports to `peer`, which is
    /// fixed for the life of this order.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the confirmation or any worker's send fails.
    /// - [`Error::WorkerFailed`] if a worker task panics.
    pub async fn run_order(
        &self,
        order_size: u32,
        peer: SocketAddr,
        specs: Vec<WorkerSpec>,
        shutdown: &CancellationToken,
    ) -> Result<OrderOutcome> {
        let span = tracing::info_span!("order", size = order_size, %peer);
        self.run_order_inner(order_size, peer, specs, shutdown)
            .instrument(span)
            .await
    }

    async fn run_order_inner(
        &self,
        order_size: u32,
        peer: SocketAddr,
        specs: Vec<WorkerSpec>,
        shutdown: &CancellationToken,
    ) -> Result<OrderOutcome> {
        let start = Instant::now();
        increment_orders_accepted();

        let link = PeerLink::new(Arc::clone(&self.transport), peer);
        let pool = Arc::new(WorkPool::new(order_size));

        let num_workers = u32::try_from(specs.len()).unwrap_or(u32::MAX);
        link.send(Message::Confirm { num_workers }).await?;
        tracing::info!("PLANT sent an order confirmation for {num_workers} workers");

        let mut handles: Vec<JoinHandle<Result<WorkerReport>>> = specs
            .into_iter()
            .map(|spec| tokio::spawn(worker_loop(spec, Arc::clone(&pool), link.clone())))
            .collect();

        let joined = tokio::select! {
            () = shutdown.cancelled() => None,
            results = join_all(handles.iter_mut()) => Some(results),
        };

        let Some(results) = joined else {
            tracing::warn!(
                "Shutdown requested with {} parts left; notifying the buyer",
                pool.remaining()
            );
            for handle in &handles {
                handle.abort();
            }
            for result in join_all(handles).await {
                match result {
                    Err(e) if !e.is_cancelled() => {
                        tracing::warn!("Worker failed during shutdown: {e}");
                    }
                    _ => {}
                }
            }
            if let Err(e) = link.send(Message::ProtocolError).await {
                tracing::warn!("Failed to notify the buyer: {e}");
            }
            increment_orders_interrupted();
            return Ok(OrderOutcome::Interrupted);
        };

        let mut workers = Vec::with_capacity(results.len());
        for result in results {
            let report = result.map_err(|e| Error::WorkerFailed {
                context: e.to_string(),
            })??;
            workers.push(report);
        }

        let elapsed = start.elapsed();
        record_order_duration(elapsed.as_secs_f64() * 1000.0);

        Ok(OrderOutcome::Completed(OrderSummary {
            order_size,
            workers,
            elapsed,
        }))
    }
}
