use nh_core::{CoreError, ValidationError};
use thiserror::Error;

/// The `Hub` facade's error surface (spec §6/§7 tier 1: synchronous
/// construction-time failures only). Everything past acceptance lands in
/// a `Receipt` instead.
#[derive(Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no eligible targets after routing")]
    NoEligibleTargets,

    #[error("queue error: {0}")]
    Queue(#[from] nh_queue::QueueError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] nh_scheduler::SchedulerError),

    #[error("transport error: {0}")]
    Transport(#[from] nh_transport::TransportError),

    #[error("context cancelled")]
    ContextCancelled,

    #[error("shutdown already in progress")]
    ShutdownInProgress,

    #[error("shutdown did not complete within the configured timeout")]
    ShutdownTimeout,
}

impl From<nh_router::RouterError> for HubError {
    fn from(_: nh_router::RouterError) -> Self {
        HubError::NoEligibleTargets
    }
}

impl From<CoreError> for HubError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(v) => HubError::Validation(v),
            CoreError::NoEligibleTargets => HubError::NoEligibleTargets,
            CoreError::QueueClosed => HubError::Queue(nh_queue::QueueError::Closed),
            CoreError::QueueFull => HubError::Queue(nh_queue::QueueError::Full),
            CoreError::ContextCancelled => HubError::ContextCancelled,
            CoreError::ShutdownInProgress => HubError::ShutdownInProgress,
            CoreError::UnknownPlatform(p) => HubError::Transport(nh_transport::TransportError::UnknownPlatform(p)),
            CoreError::RateLimited(_) => HubError::ContextCancelled,
        }
    }
}
