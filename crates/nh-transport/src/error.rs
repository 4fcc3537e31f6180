use nh_core::Retriable;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("target validation failed: {0}")]
    InvalidTarget(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("transport unhealthy: {0}")]
    Unhealthy(String),

    #[error("transport already closed")]
    Closed,

    #[error("duplicate transport name: {0}")]
    DuplicateName(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("rate limited")]
    RateLimited,

    #[error("context cancelled")]
    Cancelled,
}

/// spec §4.6: "the transport's returned error may implement a `retriable()`
/// capability; if absent, treat unknown errors as retriable." Validation
/// failures are the one kind that's never worth retrying.
impl Retriable for TransportError {
    fn retriable(&self) -> bool {
        match self {
            TransportError::InvalidTarget(_) => false,
            TransportError::UnknownPlatform(_) => false,
            TransportError::DuplicateName(_) => false,
            TransportError::Closed => false,
            TransportError::Http(_)
            | TransportError::Signing(_)
            | TransportError::Unhealthy(_)
            | TransportError::RateLimited
            | TransportError::Cancelled => true,
        }
    }
}
