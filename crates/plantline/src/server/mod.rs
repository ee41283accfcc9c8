//! The plant side of the protocol.

pub mod config;
pub mod lock;
pub mod plant;
pub mod pool;
