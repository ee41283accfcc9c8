//! # Protocol Constants
//!
//! Values both sides of the protocol must agree on at compile time.
//!
//! - [`MESSAGE_SIZE`] - Size (in bytes) of every datagram on the wire
//! - [`MAX_WORKERS`] - Upper bound on concurrent workers per order
//! - [`DEFAULT_PORT`] - Port the plant listens on when none is given

/// Number of `u32` fields in a wire message.
pub const MESSAGE_FIELDS: usize = 7;

/// The number of bytes in every encoded message.
///
/// Every purpose shares the same layout; unused fields are zero.
pub const MESSAGE_SIZE: usize = MESSAGE_FIELDS * core::mem::size_of::<u32>();

/// Maximum number of workers a plant will run for a single order.
///
/// Requested worker counts above this value are clamped.
pub const MAX_WORKERS: u32 = 20;

/// Default UDP port for the plant.
pub const DEFAULT_PORT: u16 = 50015;

/// Identifier of a worker within one order, in `1..=num_workers`.
pub type WorkerId = u32;
