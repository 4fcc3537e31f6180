//! The `Hub` facade (spec §4.9): the single entry point that owns the
//! registry, queue, scheduler, rate limiters, worker pool, and callback
//! dispatcher for their shared lifetime (spec §3 Ownership).

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use nh_core::{CallbackEventKind, Message, QueueItem, Receipt, ValidationError};
use nh_queue::{InMemoryQueue, Queue};
use nh_router::Router;
use nh_scheduler::{Scheduler, SchedulerConfig};
use nh_transport::{BlockingLimiter, RateLimiter, TokenBucketLimiter, Transport, TransportRegistry};
use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::callback::{CallbackDispatcher, CallbackHandler};
use crate::config::HubConfig;
use crate::error::HubError;
use crate::handle::{BatchHandle, Handle};
use crate::middleware::Middleware;
use crate::state::{InFlightSlot, Shared};
use crate::worker::WorkerPool;

pub struct Hub {
    shared: Arc<Shared>,
    pool: SyncMutex<Option<WorkerPool>>,
    shutdown_timeout: Duration,
    accepting: AtomicBool,
}

impl Hub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new(config.queue.buffer_size));

        let scheduler = Scheduler::new(
            queue.clone(),
            SchedulerConfig {
                tick_period: config.scheduler_tick,
                drain_on_stop: false,
            },
        );
        scheduler.start();

        let router = Arc::new(Router::new(config.routing.clone()));

        let rate_limiters = config
            .rate_limits
            .iter()
            .map(|(platform, limit)| {
                let limiter: Arc<dyn RateLimiter> = if limit.rps == 0 {
                    Arc::new(BlockingLimiter)
                } else {
                    let rps = NonZeroU32::new(limit.rps).unwrap_or(NonZeroU32::MIN);
                    let burst = NonZeroU32::new(limit.burst).unwrap_or(NonZeroU32::MIN);
                    Arc::new(TokenBucketLimiter::new(rps, burst))
                };
                (platform.clone(), limiter)
            })
            .collect();

        let shared = Arc::new(Shared {
            registry: Arc::new(TransportRegistry::new()),
            queue,
            scheduler,
            router,
            rate_limiters,
            retry_policy: config.queue.retry,
            callbacks: Arc::new(CallbackDispatcher::new(config.callback_concurrency)),
            middlewares: RwLock::new(Vec::new()),
            in_flight: DashMap::new(),
            cancel_flags: DashSet::new(),
            item_deadline: config.item_deadline,
            draining: CancellationToken::new(),
        });

        let pool = WorkerPool::spawn(config.workers.max(1), shared.clone());

        info!(workers = config.workers, "hub started");

        Arc::new(Self {
            shared,
            pool: SyncMutex::new(Some(pool)),
            shutdown_timeout: config.shutdown_timeout,
            accepting: AtomicBool::new(true),
        })
    }

    pub fn register_transport(&self, transport: Arc<dyn Transport>) -> Result<(), HubError> {
        self.shared.registry.register(transport).map_err(Into::into)
    }

    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.shared.middlewares.write().push(middleware);
    }

    pub fn on_event(&self, kind: CallbackEventKind, handler: CallbackHandler) {
        self.shared.callbacks.register(kind, handler);
    }

    pub fn active_workers(&self) -> usize {
        self.pool.lock().as_ref().map(|p| p.active_workers()).unwrap_or(0)
    }

    pub fn queue_size(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn scheduler_size(&self) -> usize {
        self.shared.scheduler.size()
    }

    /// Synchronous from the caller's point of view: validates and routes,
    /// then either schedules (if `delay > 0`) or enqueues, and awaits
    /// completion up to `ctx` (spec §4.9). `send` fails synchronously only
    /// for construction-time problems (spec §7 tier 1); everything after
    /// acceptance surfaces inside the returned `Receipt`.
    pub async fn send(&self, ctx: CancellationToken, message: Message) -> Result<Receipt, HubError> {
        let handle = self.send_async(ctx.clone(), message).await?;
        handle.wait(ctx).await
    }

    pub async fn send_async(&self, ctx: CancellationToken, message: Message) -> Result<Handle, HubError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(HubError::ShutdownInProgress);
        }

        let message = message.finalize();
        if !message.is_deliverable() {
            return Err(ValidationError::new(
                "message",
                "a message needs a non-empty title or body, and at least one target",
            )
            .into());
        }

        let routed = self.shared.router.route(&message)?;
        let total = routed.len() as u32;

        let mut item = QueueItem::new(message.clone());
        item.targets = routed;

        let (tx, rx) = watch::channel(None);
        self.shared.in_flight.insert(
            message.id.clone(),
            InFlightSlot {
                receipt: Receipt::pending(&message.id, total),
                tx,
            },
        );

        if message.delay > Duration::ZERO {
            let release_at =
                Utc::now() + chrono::Duration::from_std(message.delay).unwrap_or_else(|_| chrono::Duration::zero());
            self.shared.scheduler.schedule(item, release_at);
        } else if let Err(e) = self.shared.queue.enqueue(ctx, item).await {
            self.shared.in_flight.remove(&message.id);
            return Err(e.into());
        }

        Ok(Handle::new(message.id, rx, self.shared.clone()))
    }

    pub async fn send_batch(&self, ctx: CancellationToken, messages: Vec<Message>) -> Result<BatchHandle, HubError> {
        let mut handles = Vec::with_capacity(messages.len());
        for message in messages {
            handles.push(self.send_async(ctx.clone(), message).await?);
        }
        Ok(BatchHandle::new(handles))
    }

    pub async fn health(&self, ctx: CancellationToken) -> HashMap<String, Option<String>> {
        let mut result: HashMap<String, Option<String>> = self
            .shared
            .registry
            .health(ctx.clone())
            .await
            .into_iter()
            .map(|(name, err)| (name, err.map(|e| e.to_string())))
            .collect();
        result.insert("queue".to_string(), self.shared.queue.health(ctx).await.err().map(|e| e.to_string()));
        result
    }

    /// Two-phase shutdown (spec §5): stop accepting new work immediately,
    /// then drain outstanding work up to `shutdown_timeout` or `ctx`,
    /// whichever comes first.
    pub async fn shutdown(&self, ctx: CancellationToken) -> Result<(), HubError> {
        let was_accepting = self.accepting.swap(false, Ordering::SeqCst);
        if !was_accepting {
            return Err(HubError::ShutdownInProgress);
        }

        self.shared.draining.cancel();

        let Some(pool) = self.pool.lock().take() else {
            return Ok(());
        };

        let join_fut = pool.join();
        tokio::pin!(join_fut);

        tokio::select! {
            _ = &mut join_fut => {}
            _ = ctx.cancelled() => return Err(HubError::ShutdownTimeout),
            _ = tokio::time::sleep(self.shutdown_timeout) => return Err(HubError::ShutdownTimeout),
        }

        let _ = self.shared.scheduler.stop().await;
        self.shared.registry.close().await.map_err(Into::into)
    }
}
