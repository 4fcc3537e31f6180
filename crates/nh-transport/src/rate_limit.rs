use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Per-platform token bucket (spec §4.7). Construction is static; there is
/// no runtime reconfiguration in the core spec.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Blocks until a token is available or `ctx` is cancelled.
    async fn consume(&self, ctx: CancellationToken) -> Result<(), TransportError>;
}

/// Admits all traffic; used when a platform has no configured limit.
pub struct NoOpLimiter;

#[async_trait::async_trait]
impl RateLimiter for NoOpLimiter {
    async fn consume(&self, _ctx: CancellationToken) -> Result<(), TransportError> {
        Ok(())
    }
}

/// `rps = 0` (spec §8 boundary behavior): never admits, blocks until `ctx`
/// is cancelled.
pub struct BlockingLimiter;

#[async_trait::async_trait]
impl RateLimiter for BlockingLimiter {
    async fn consume(&self, ctx: CancellationToken) -> Result<(), TransportError> {
        ctx.cancelled().await;
        Err(TransportError::Cancelled)
    }
}

/// Standard token-bucket limiter built on `governor`'s lock-free,
/// atomic-clock implementation — avoids per-call lock contention (spec
/// §9).
pub struct TokenBucketLimiter {
    inner: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TokenBucketLimiter {
    pub fn new(rate_per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(rate_per_second).allow_burst(burst);
        Self {
            inner: Arc::new(GovernorLimiter::direct(quota)),
        }
    }
}

#[async_trait::async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn consume(&self, ctx: CancellationToken) -> Result<(), TransportError> {
        tokio::select! {
            _ = self.inner.until_ready() => Ok(()),
            _ = ctx.cancelled() => Err(TransportError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_op_never_blocks() {
        let limiter = NoOpLimiter;
        for _ in 0..1000 {
            limiter.consume(CancellationToken::new()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn token_bucket_admits_within_burst() {
        let limiter = TokenBucketLimiter::new(
            NonZeroU32::new(100).unwrap(),
            NonZeroU32::new(5).unwrap(),
        );
        for _ in 0..5 {
            limiter.consume(CancellationToken::new()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn blocking_limiter_waits_for_cancellation() {
        let ctx = CancellationToken::new();
        let ctx2 = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            ctx2.cancel();
        });
        let err = BlockingLimiter.consume(ctx).await.unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_context_unblocks_exhausted_bucket() {
        let limiter = TokenBucketLimiter::new(NonZeroU32::new(1).unwrap(), NonZeroU32::new(1).unwrap());
        limiter.consume(CancellationToken::new()).await.unwrap();

        let ctx = CancellationToken::new();
        let ctx2 = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            ctx2.cancel();
        });
        let err = limiter.consume(ctx).await.unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }
}
