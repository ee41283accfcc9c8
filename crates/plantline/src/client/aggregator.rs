//! Buyer-side aggregation of one order session.
//!
//! An [`Aggregator`] is created once the plant has confirmed the worker count
//! and is fed every subsequent message. It keeps a [`WorkerTally`] per worker,
//! counts the workers that have not yet reported completion, and turns into a
//! [`ProcurementReport`] once that count reaches zero.
//!
//! The aggregator is a pure state machine: it never touches the network and
//! can be driven directly from tests.

use core::fmt;
use plantline_core::{Error, Message, Result, types::WorkerId};
use std::collections::{BTreeMap, BTreeSet};

/// Running totals for one worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub parts_made: u64,
    pub iterations: u32,
}

/// Where the session stands after a message has been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Collecting { active_workers: u32 },
    Finished,
}

#[derive(Debug)]
pub struct Aggregator {
    order_size: u32,
    active_workers: u32,
    tallies: BTreeMap<WorkerId, WorkerTally>,
    completed: BTreeSet<WorkerId>,
}

impl Aggregator {
    /// Starts collecting for `num_workers` workers, numbered `1..=num_workers`.
    ///
    /// One tally is allocated per worker; callers bound `num_workers` by
    /// [`MAX_WORKERS`](plantline_core::types::MAX_WORKERS) first.
    pub fn new(order_size: u32, num_workers: u32) -> Self {
        Self {
            order_size,
            active_workers: num_workers,
            tallies: (1..=num_workers)
                .map(|id| (id, WorkerTally::default()))
                .collect(),
            completed: BTreeSet::new(),
        }
    }

    pub const fn active_workers(&self) -> u32 {
        self.active_workers
    }

    pub const fn is_finished(&self) -> bool {
        self.active_workers == 0
    }

    /// Folds one message into the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionAborted`] on PROTOCOL_ERR, whatever the number
    /// of workers still active.
    pub fn apply(&mut self, message: Message) -> Result<Step> {
        match message {
            Message::Progress {
                worker_id,
                parts_made,
                duration_ms,
                ..
            } => {
                if self.completed.contains(&worker_id) {
                    tracing::warn!("Ignoring progress from completed worker #{worker_id}");
                } else if let Some(tally) = self.tallies.get_mut(&worker_id) {
                    tally.parts_made += u64::from(parts_made);
                    tally.iterations += 1;
                    tracing::info!(
                        "PROCUREMENT: Factory #{:<2}  produced {:<5} parts in {:<4}  milliSecs",
                        worker_id,
                        parts_made,
                        duration_ms
                    );
                } else {
                    tracing::warn!("Ignoring progress from unknown worker #{worker_id}");
                }
            }
            Message::Completion { worker_id } => {
                if !self.tallies.contains_key(&worker_id) {
                    tracing::warn!("Ignoring completion from unknown worker #{worker_id}");
                } else if !self.completed.insert(worker_id) {
                    tracing::warn!("Ignoring duplicate completion from worker #{worker_id}");
                } else {
                    self.active_workers -= 1;
                    tracing::info!("PROCUREMENT: Factory #{worker_id:<2}        COMPLETED its task");
                }
            }
            Message::ProtocolError => {
                tracing::error!(
                    "PROCUREMENT: Plant aborted the order with {} workers still active",
                    self.active_workers
                );
                return Err(Error::SessionAborted);
            }
            other => tracing::warn!("PROCUREMENT: Received invalid msg {other:?}"),
        }

        Ok(if self.is_finished() {
            Step::Finished
        } else {
            Step::Collecting {
                active_workers: self.active_workers,
            }
        })
    }

    /// Closes the session. Tallies reflect whatever was applied so far.
    pub fn into_report(self) -> ProcurementReport {
        ProcurementReport {
            order_size: self.order_size,
            workers: self.tallies,
        }
    }
}

/// Final result of one order as seen by the buyer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcurementReport {
    pub order_size: u32,
    pub workers: BTreeMap<WorkerId, WorkerTally>,
}

impl ProcurementReport {
    pub fn grand_total(&self) -> u64 {
        self.workers.values().map(|t| t.parts_made).sum()
    }

    /// `true` if fewer parts arrived than were ordered.
    pub fn is_short(&self) -> bool {
        self.grand_total() < u64::from(self.order_size)
    }
}

impl fmt::Display for ProcurementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "****** PROCUREMENT Summary Report ******")?;
        for (id, tally) in &self.workers {
            writeln!(
                f,
                "Factory # {:2} made a total of {:5} parts in {:5} iterations",
                id, tally.parts_made, tally.iterations
            )?;
        }
        writeln!(f, "==============================")?;
        write!(
            f,
            "Grand total parts made = {:5}   vs  order size of {:5}",
            self.grand_total(),
            self.order_size
        )
    }
}
