use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use nh_core::QueueItem;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use crate::queue::Queue;

/// Bounded in-memory queue: the spec's default (spec §4.3). `enqueue`
/// blocks while the channel is full and `dequeue` blocks while it's empty,
/// both respecting the caller's `ctx`. `ack` is a no-op; `nack` only
/// releases this queue's bookkeeping — the `Scheduler` hand-off described
/// in spec §4.3 happens one layer up, in the worker pool, which already
/// holds both a `Queue` and a `Scheduler` handle.
pub struct InMemoryQueue {
    sender: mpsc::Sender<(String, QueueItem)>,
    receiver: Mutex<mpsc::Receiver<(String, QueueItem)>>,
    size: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            size: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Non-blocking enqueue: returns `QueueError::Full` immediately
    /// instead of waiting for capacity. Exposed for callers that want the
    /// "full" boundary surfaced explicitly rather than as a generic
    /// cancellation (spec §6: `ErrQueueFull` is "a timeout in disguise").
    pub fn try_enqueue(&self, item: QueueItem) -> Result<String, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.sender
            .try_send((id.clone(), item))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })?;
        self.size.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!("notifyhub.queue.size").set(self.size.load(Ordering::SeqCst) as f64);
        Ok(id)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, ctx: CancellationToken, item: QueueItem) -> Result<String, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let id = uuid::Uuid::new_v4().to_string();
        tokio::select! {
            res = self.sender.send((id.clone(), item)) => {
                res.map_err(|_| QueueError::Closed)?;
                self.size.fetch_add(1, Ordering::SeqCst);
                metrics::gauge!("notifyhub.queue.size").set(self.size.load(Ordering::SeqCst) as f64);
                Ok(id)
            }
            _ = ctx.cancelled() => Err(QueueError::Cancelled),
        }
    }

    async fn dequeue(&self, ctx: CancellationToken) -> Result<(String, QueueItem), QueueError> {
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            item = receiver.recv() => {
                let (id, item) = item.ok_or(QueueError::Closed)?;
                self.size.fetch_sub(1, Ordering::SeqCst);
                metrics::gauge!("notifyhub.queue.size").set(self.size.load(Ordering::SeqCst) as f64);
                Ok((id, item))
            }
            _ = ctx.cancelled() => Err(QueueError::Cancelled),
        }
    }

    async fn ack(&self, _id: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn nack(&self, _id: &str) -> Result<(), QueueError> {
        Ok(())
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    async fn health(&self, _ctx: CancellationToken) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nh_core::Message;

    #[tokio::test]
    async fn two_sends_on_capacity_two_never_hit_full() {
        let queue = InMemoryQueue::new(2);
        let ctx = CancellationToken::new();
        queue.enqueue(ctx.clone(), QueueItem::new(Message::default())).await.unwrap();
        queue.enqueue(ctx, QueueItem::new(Message::default())).await.unwrap();
        assert_eq!(queue.size(), 2);
    }

    #[tokio::test]
    async fn dequeue_returns_in_fifo_order() {
        let queue = InMemoryQueue::new(4);
        let ctx = CancellationToken::new();
        let mut first = Message::default();
        first.id = "first".into();
        let mut second = Message::default();
        second.id = "second".into();
        queue.enqueue(ctx.clone(), QueueItem::new(first)).await.unwrap();
        queue.enqueue(ctx.clone(), QueueItem::new(second)).await.unwrap();

        let (_, item1) = queue.dequeue(ctx.clone()).await.unwrap();
        let (_, item2) = queue.dequeue(ctx).await.unwrap();
        assert_eq!(item1.message.id, "first");
        assert_eq!(item2.message.id, "second");
    }

    #[tokio::test]
    async fn try_enqueue_reports_full_immediately() {
        let queue = InMemoryQueue::new(1);
        queue.try_enqueue(QueueItem::new(Message::default())).unwrap();
        let err = queue.try_enqueue(QueueItem::new(Message::default())).unwrap_err();
        assert!(matches!(err, QueueError::Full));
    }

    #[tokio::test]
    async fn enqueue_after_close_is_closed_error() {
        let queue = InMemoryQueue::new(4);
        queue.close().await.unwrap();
        let err = queue
            .enqueue(CancellationToken::new(), QueueItem::new(Message::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }

    #[tokio::test]
    async fn dequeue_respects_cancellation_when_empty() {
        let queue = InMemoryQueue::new(4);
        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = queue.dequeue(ctx).await.unwrap_err();
        assert!(matches!(err, QueueError::Cancelled));
    }
}
