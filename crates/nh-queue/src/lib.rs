//! The `Queue` contract plus the in-memory default and an optional
//! `sqlx`-backed durable alternative (spec §4.3).

pub mod error;
#[cfg(feature = "durable")]
pub mod durable;
pub mod memory;
pub mod queue;

pub use error::QueueError;
#[cfg(feature = "durable")]
pub use durable::{DurableQueue, DurableQueueConfig};
pub use memory::InMemoryQueue;
pub use queue::Queue;
