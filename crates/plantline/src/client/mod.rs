//! The buyer side of the protocol.

pub mod aggregator;
pub mod config;
pub mod session;
