//! Delay and retry scheduling: a single-owner min-heap keyed by release
//! time, ticked on a fixed interval (spec §4.4).

pub mod error;
pub mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, SchedulerConfig};
