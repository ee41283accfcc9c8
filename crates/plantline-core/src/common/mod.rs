//! Protocol definitions shared by the plant and the buyer.
//!
//! - [`error`] - The unified [`Error`](error::Error) type.
//! - [`message`] - Fixed-layout datagram codec.
//! - [`types`] - Protocol constants.

pub mod error;
pub mod message;
pub mod types;

pub use error::{Error, Result};
pub use message::{Message, Purpose};
