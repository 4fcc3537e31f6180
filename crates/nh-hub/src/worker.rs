//! Worker Pool (spec §4.5): N independent loops sharing one `Queue`. Each
//! dequeues an item, dispatches it target-by-target through the registry,
//! and either acks it or hands a narrowed retry back to the `Scheduler`.
//! Structurally this is a trimmed-down relative of `fc-router`'s
//! `ProcessPool` group workers: no per-message-group FIFO lanes here (the
//! spec has no equivalent concept), but the same shape of "spawn one loop
//! per slot, block on a channel, track an active-workers counter."

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use nh_core::{CallbackEvent, CallbackEventKind, Message, QueueItem, SendResult, SendStatus, Target};
use nh_queue::QueueError;
use nh_transport::{NoOpLimiter, RateLimiter};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::Shared;

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn spawn(count: usize, shared: Arc<Shared>) -> Self {
        let active = Arc::new(AtomicUsize::new(0));
        let handles = (0..count)
            .map(|id| {
                let shared = shared.clone();
                let active = active.clone();
                tokio::spawn(async move { run(id, shared, active).await })
            })
            .collect();
        Self { handles, active }
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Consumes the pool, awaiting every worker's exit.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run(id: usize, shared: Arc<Shared>, active: Arc<AtomicUsize>) {
    debug!(worker = id, "worker started");
    loop {
        if shared.draining.is_cancelled() {
            break;
        }

        let (queue_id, item) = match shared.queue.dequeue(shared.draining.clone()).await {
            Ok(v) => v,
            Err(QueueError::Cancelled) => {
                if shared.draining.is_cancelled() {
                    break;
                }
                continue;
            }
            Err(QueueError::Closed) => break,
            Err(e) => {
                warn!(worker = id, error = %e, "dequeue failed");
                continue;
            }
        };

        active.fetch_add(1, Ordering::SeqCst);
        process_item(id, &shared, queue_id, item).await;
        active.fetch_sub(1, Ordering::SeqCst);
    }
    info!(worker = id, "worker exited");
}

/// Handles one dequeued item end to end: per-target dispatch, then
/// aggregation (ack/nack + callbacks + `Receipt` resolution) per spec
/// §4.5 step 3.
async fn process_item(worker_id: usize, shared: &Arc<Shared>, queue_id: String, item: QueueItem) {
    let message_id = item.message.id.clone();

    let item_ctx = CancellationToken::new();
    let deadline_ctx = item_ctx.clone();
    let deadline = shared.item_deadline;
    let timer = tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        deadline_ctx.cancel();
    });

    let cancelled_before_dispatch = shared.cancel_flags.remove(&message_id).is_some();

    let attempt = item.attempts + 1;
    let mut local_results: Vec<SendResult> = Vec::with_capacity(item.targets.len());

    if cancelled_before_dispatch {
        for target in &item.targets {
            local_results.push(cancelled_result(&message_id, target, attempt));
        }
    } else {
        for target in &item.targets {
            local_results.push(send_one(shared, &item_ctx, &item.message, target, attempt).await);
        }
    }

    timer.abort();

    let all_sent = local_results.iter().all(|r| r.is_terminal_success());
    let receipt_snapshot = record_results(shared, &message_id, local_results.clone());

    if all_sent {
        let _ = shared.queue.ack(&queue_id).await;
        emit(shared, CallbackEventKind::Sent, &message_id, attempt, None, &receipt_snapshot);
        shared.resolve(&message_id);
        return;
    }

    let retriable_failed: Vec<Target> = item
        .targets
        .iter()
        .zip(local_results.iter())
        .filter(|(_, r)| !r.is_terminal_success() && r.retriable)
        .map(|(t, _)| t.clone())
        .collect();

    if !retriable_failed.is_empty() && shared.retry_policy.should_retry(item.attempts) {
        let retry_after = shared.retry_policy.interval(item.attempts);
        let _ = shared.queue.nack(&queue_id).await;
        let mut retry_item = item.clone();
        retry_item.targets = retriable_failed;
        retry_item.attempts += 1;
        let release_at = Utc::now()
            + chrono::Duration::from_std(retry_after).unwrap_or_else(|_| chrono::Duration::zero());
        shared.scheduler.schedule(retry_item, release_at);
        emit(shared, CallbackEventKind::Retry, &message_id, attempt, None, &receipt_snapshot);
        debug!(worker = worker_id, message_id = %message_id, retry_after = ?retry_after, "scheduled retry");
        return;
    }

    let _ = shared.queue.ack(&queue_id).await;
    emit(shared, CallbackEventKind::Failed, &message_id, attempt, None, &receipt_snapshot);
    if !retriable_failed.is_empty() && !shared.retry_policy.should_retry(item.attempts) {
        emit(shared, CallbackEventKind::MaxRetries, &message_id, attempt, None, &receipt_snapshot);
    }
    shared.resolve(&message_id);
}

async fn send_one(shared: &Arc<Shared>, ctx: &CancellationToken, message: &Message, target: &Target, attempt: u32) -> SendResult {
    let middlewares = shared.middlewares.read().clone();
    for m in &middlewares {
        m.before_send(message, target).await;
    }

    let result = send_one_inner(shared, ctx, message, target, attempt).await;

    for m in &middlewares {
        m.after_send(message, target, &result).await;
    }
    result
}

async fn send_one_inner(shared: &Arc<Shared>, ctx: &CancellationToken, message: &Message, target: &Target, attempt: u32) -> SendResult {
    let Some(transport) = shared.registry.get(&target.platform) else {
        let mut result = SendResult::started(&message.id, target.clone(), attempt);
        result.finish(
            SendStatus::Failed,
            &target.platform,
            Some(format!("unknown platform: {}", target.platform)),
            None,
        );
        return result.mark_not_retriable();
    };

    let limiter: Arc<dyn RateLimiter> = shared
        .rate_limiters
        .get(&target.platform)
        .cloned()
        .unwrap_or_else(|| Arc::new(NoOpLimiter));

    if let Err(e) = limiter.consume(ctx.clone()).await {
        let mut result = SendResult::started(&message.id, target.clone(), attempt);
        result.finish(SendStatus::Failed, &target.platform, Some(e.to_string()), None);
        return result;
    }

    transport.send(ctx.clone(), message, target).await
}

fn cancelled_result(message_id: &str, target: &Target, attempt: u32) -> SendResult {
    let mut result = SendResult::started(message_id, target.clone(), attempt);
    result.finish(SendStatus::Cancelled, "", Some("cancelled before dispatch".into()), None);
    result
}

/// `mark_not_retriable` only touches `Failed` results, so a `Cancelled`
/// one needs its `retriable` flag forced off here instead.
fn record_results(shared: &Arc<Shared>, message_id: &str, mut results: Vec<SendResult>) -> nh_core::Receipt {
    for r in &mut results {
        if r.status == SendStatus::Cancelled {
            r.retriable = false;
        }
    }
    let mut entry = shared
        .in_flight
        .get_mut(message_id)
        .expect("in-flight receipt registered before a message reaches the worker pool");
    entry.receipt.results.extend(results);
    entry.receipt.recompute();
    entry.receipt.clone()
}

fn emit(
    shared: &Arc<Shared>,
    kind: CallbackEventKind,
    message_id: &str,
    attempt: u32,
    duration_ms: Option<u64>,
    receipt: &nh_core::Receipt,
) {
    shared.callbacks.dispatch(CallbackEvent {
        kind,
        message_id: message_id.to_string(),
        attempt,
        duration_ms,
        error: None,
        receipt: receipt.clone(),
    });
}
