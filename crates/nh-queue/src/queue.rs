use async_trait::async_trait;
use nh_core::QueueItem;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;

/// FIFO-ish interface for ready-to-send `QueueItem`s (spec §4.3). The
/// default implementation is in-memory and genuinely FIFO; a stream-backed
/// alternative only promises at-least-once delivery and may reorder across
/// attempts — callers must not depend on strict ordering across >1 worker.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, ctx: CancellationToken, item: QueueItem) -> Result<String, QueueError>;

    /// Returns the item's queue-assigned id alongside the item itself, so
    /// the caller can `ack`/`nack` it later.
    async fn dequeue(&self, ctx: CancellationToken) -> Result<(String, QueueItem), QueueError>;

    /// No-op for the in-memory default; for an at-least-once backend this
    /// marks the row permanently delivered.
    async fn ack(&self, id: &str) -> Result<(), QueueError>;

    /// Marks `id` as not-yet-delivered; the caller (the worker pool) is
    /// responsible for handing the rebuilt `QueueItem` to the `Scheduler`
    /// for the actual `retry_after` delay — `nack` here only releases this
    /// queue's own claim on the row so it isn't redelivered prematurely.
    async fn nack(&self, id: &str) -> Result<(), QueueError>;

    fn size(&self) -> usize;

    async fn health(&self, ctx: CancellationToken) -> Result<(), QueueError>;

    async fn close(&self) -> Result<(), QueueError>;
}
