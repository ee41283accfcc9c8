//! Error types for the order service.
//!
//! This module defines the central `Error` enum shared by the plant and the
//! buyer. Transport faults carry the underlying [`std::io::Error`]; protocol
//! faults are reported with enough context to be logged and skipped.
//!
//! ## Error Cases
//! - `Malformed`: A datagram was not exactly one message long.
//! - `Transport`: A socket operation failed (bind, send, receive, address).
//! - `InstanceLocked`: Another plant instance holds the coordination lock.
//! - `LockFile`: The coordination lock file could not be created.
//! - `SessionAborted`: The plant terminated the order mid-flight.
//! - `Timeout`: The peer stayed silent longer than the configured limit.
//! - `WorkerFailed`: A worker task panicked or was lost.

use core::time::Duration;
use std::{io, path::PathBuf};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the order service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A datagram of the wrong size was received.
    #[error("Malformed message: expected {expected} bytes, got {len}")]
    Malformed { len: usize, expected: usize },

    /// A socket operation failed.
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The coordination lock is already held by another instance.
    #[error("Another plant instance holds the lock at {}", path.display())]
    InstanceLocked { path: PathBuf },

    /// The lock file could not be created for a reason other than contention.
    #[error("Failed to create lock file {}", path.display())]
    LockFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The plant sent a protocol error, aborting the session.
    #[error("Session aborted by the plant")]
    SessionAborted,

    /// Nothing was received from the peer within the allowed window.
    #[error("No message from the plant within {waited:?}")]
    Timeout { waited: Duration },

    /// A worker task did not run to completion.
    #[error("Worker failed: {context}")]
    WorkerFailed { context: String },
}

impl Error {
    /// Wraps an I/O error with a short description of the failed operation.
    pub fn transport(context: impl Into<String>, source: io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for faults the receiver should log and skip rather than
    /// propagate.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
