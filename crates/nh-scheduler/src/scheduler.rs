use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use nh_core::QueueItem;
use nh_queue::Queue;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SchedulerError;

struct ScheduledEntry {
    release_at: DateTime<Utc>,
    seq: u64,
    message_id: String,
    item: QueueItem,
}

/// Ascending by `(release_at, seq)`; wrapped in `Reverse` at push time so a
/// `BinaryHeap` (max-heap by default) behaves as the min-heap spec §4.4
/// asks for. Two entries with equal `release_at` compare by insertion
/// order only to give the heap a total order — spec §4.4 explicitly
/// allows either to promote first.
impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.release_at == other.release_at && self.seq == other.seq
    }
}
impl Eq for ScheduledEntry {}
impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release_at.cmp(&other.release_at).then(self.seq.cmp(&other.seq))
    }
}

pub struct SchedulerConfig {
    pub tick_period: Duration,
    /// When true, `stop()` flushes the whole heap into the `Queue` instead
    /// of discarding it (spec §4.4; default is discard-and-return).
    pub drain_on_stop: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            drain_on_stop: false,
        }
    }
}

/// Holds delayed items and items awaiting retry; promotes them to the
/// `Queue` once `release_at` has passed (spec §4.4). A single mutex
/// serializes heap mutation — simpler and adequate at 100ms tick
/// granularity (spec §9), not a lock-free priority structure.
pub struct Scheduler {
    heap: Mutex<BinaryHeap<Reverse<ScheduledEntry>>>,
    pending: DashSet<String>,
    cancelled: DashSet<String>,
    seq: AtomicU64,
    queue: Arc<dyn Queue>,
    config: SchedulerConfig,
    running: AtomicBool,
    shutdown: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(queue: Arc<dyn Queue>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            heap: Mutex::new(BinaryHeap::new()),
            pending: DashSet::new(),
            cancelled: DashSet::new(),
            seq: AtomicU64::new(0),
            queue,
            config,
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            ticker: Mutex::new(None),
        })
    }

    /// Starts the background tick loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.tick_period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = this.promote_ready().await {
                            warn!(error = %e, "scheduler promote failed");
                        }
                    }
                    _ = this.shutdown.cancelled() => break,
                }
            }
        });
        *self.ticker.lock() = Some(handle);
    }

    /// Schedules `item` for release at `release_at`, returning the
    /// message id used for `cancel`.
    pub fn schedule(&self, item: QueueItem, release_at: DateTime<Utc>) -> String {
        let message_id = item.message.id.clone();
        let seq = self.seq.fetch_add(1, AtomicOrdering::SeqCst);
        self.pending.insert(message_id.clone());
        self.heap.lock().push(Reverse(ScheduledEntry {
            release_at,
            seq,
            message_id: message_id.clone(),
            item,
        }));
        metrics::gauge!("notifyhub.scheduler.size").set(self.size() as f64);
        message_id
    }

    /// Removes a not-yet-promoted item. Returns `true` iff it was still
    /// pending (spec §4.4). Uses lazy deletion: the heap entry is left in
    /// place and dropped silently when popped.
    pub fn cancel(&self, message_id: &str) -> bool {
        if self.pending.remove(message_id).is_some() {
            self.cancelled.insert(message_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn size(&self) -> usize {
        self.pending.len()
    }

    async fn promote_ready(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let mut ready = Vec::new();
        {
            let mut heap = self.heap.lock();
            while let Some(Reverse(entry)) = heap.peek() {
                if entry.release_at > now {
                    break;
                }
                let Reverse(entry) = heap.pop().unwrap();
                ready.push(entry);
            }
        }

        for entry in ready {
            if self.cancelled.remove(&entry.message_id).is_some() {
                debug!(message_id = %entry.message_id, "dropping cancelled scheduled item");
                continue;
            }
            self.pending.remove(&entry.message_id);
            self.queue.enqueue(self.shutdown.clone(), entry.item).await?;
            metrics::counter!("notifyhub.scheduler.promoted_total").increment(1);
        }
        Ok(())
    }

    /// Stops the tick loop. If `drain_on_stop` is set, every still-pending
    /// item is flushed into the `Queue` regardless of `release_at`;
    /// otherwise the heap is discarded (spec §4.4 default).
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        if self.config.drain_on_stop {
            let drained: Vec<ScheduledEntry> = {
                let mut heap = self.heap.lock();
                std::mem::take(&mut *heap).into_iter().map(|Reverse(e)| e).collect()
            };
            for entry in drained {
                if self.cancelled.remove(&entry.message_id).is_some() {
                    continue;
                }
                self.pending.remove(&entry.message_id);
                self.queue.enqueue(self.shutdown.clone(), entry.item).await?;
            }
        } else {
            self.heap.lock().clear();
            self.pending.clear();
        }

        self.shutdown.cancel();
        if let Some(handle) = self.ticker.lock().take() {
            let _ = handle.await;
        }
        self.running.store(false, AtomicOrdering::SeqCst);
        info!("scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nh_core::Message;
    use nh_queue::InMemoryQueue;

    fn item(id: &str) -> QueueItem {
        let mut message = Message::default();
        message.id = id.to_string();
        QueueItem::new(message)
    }

    #[tokio::test]
    async fn promotes_item_after_delay() {
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new(4));
        let scheduler = Scheduler::new(
            queue.clone(),
            SchedulerConfig {
                tick_period: Duration::from_millis(10),
                drain_on_stop: false,
            },
        );
        scheduler.start();

        let release_at = Utc::now() + chrono::Duration::milliseconds(30);
        scheduler.schedule(item("m1"), release_at);
        assert_eq!(scheduler.size(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.size(), 0);
        assert_eq!(queue.size(), 1);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_prevents_promotion() {
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new(4));
        let scheduler = Scheduler::new(
            queue.clone(),
            SchedulerConfig {
                tick_period: Duration::from_millis(10),
                drain_on_stop: false,
            },
        );
        scheduler.start();

        let release_at = Utc::now() + chrono::Duration::milliseconds(20);
        scheduler.schedule(item("m1"), release_at);
        assert!(scheduler.cancel("m1"));
        assert!(!scheduler.cancel("m1"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(queue.size(), 0);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn drain_on_stop_flushes_pending_items() {
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new(4));
        let scheduler = Scheduler::new(
            queue.clone(),
            SchedulerConfig {
                tick_period: Duration::from_secs(60),
                drain_on_stop: true,
            },
        );
        scheduler.start();
        scheduler.schedule(item("m1"), Utc::now() + chrono::Duration::seconds(60));
        scheduler.stop().await.unwrap();
        assert_eq!(queue.size(), 1);
    }
}
