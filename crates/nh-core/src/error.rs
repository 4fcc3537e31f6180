//! Shared error vocabulary.
//!
//! Each `nh-*` crate defines its own `thiserror` enum for its internal
//! concerns (`QueueError`, `SchedulerError`, ...); `CoreError` is the set of
//! errors the `Hub` facade itself surfaces synchronously, per spec §6/§7.

use thiserror::Error;

/// A synchronous, construction-time validation failure (spec §7 tier 1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("queue is closed")]
    QueueClosed,

    #[error("queue is full")]
    QueueFull,

    #[error("no eligible targets after routing")]
    NoEligibleTargets,

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("rate limited on platform: {0}")]
    RateLimited(String),

    #[error("context cancelled")]
    ContextCancelled,

    #[error("shutdown in progress")]
    ShutdownInProgress,
}

/// Capability a transport (or transport-wrapped) error may implement to
/// override the default retry classification (spec §4.6). Unknown errors
/// that don't implement this are treated as retriable.
pub trait Retriable {
    fn retriable(&self) -> bool;
}

impl Retriable for CoreError {
    fn retriable(&self) -> bool {
        match self {
            CoreError::Validation(_) => false,
            CoreError::NoEligibleTargets => false,
            CoreError::UnknownPlatform(_) => false,
            CoreError::QueueClosed
            | CoreError::QueueFull
            | CoreError::RateLimited(_)
            | CoreError::ContextCancelled
            | CoreError::ShutdownInProgress => true,
        }
    }
}
