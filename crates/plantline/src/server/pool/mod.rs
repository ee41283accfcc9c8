//! The production line for a single order.
//!
//! - [`work`] - The shared [`WorkPool`](work::WorkPool) workers claim from.
//! - [`worker`] - The per-worker claim / produce / report loop.

pub mod work;
pub mod worker;
