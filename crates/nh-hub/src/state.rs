use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use nh_core::Receipt;
use nh_queue::Queue;
use nh_router::Router;
use nh_scheduler::Scheduler;
use nh_transport::{RateLimiter, RetryPolicy, TransportRegistry};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::callback::CallbackDispatcher;
use crate::middleware::Middleware;

/// One submitted message's accumulating outcome, shared between whichever
/// worker currently holds it and every `Handle`/`BatchHandle` watching it.
/// A retried `QueueItem` may land on a different worker than its previous
/// attempt (spec §4.5), so this lives in the `Hub`, not on the worker.
pub(crate) struct InFlightSlot {
    pub receipt: Receipt,
    pub tx: watch::Sender<Option<Receipt>>,
}

/// Everything a `Worker` task and a `Handle` both need a reference to.
/// Construction-immutable except for the registry (RW-locked) and the two
/// concurrent maps (spec §3 Ownership, §9 "shared mutable state
/// minimization").
pub(crate) struct Shared {
    pub registry: Arc<TransportRegistry>,
    pub queue: Arc<dyn Queue>,
    pub scheduler: Arc<Scheduler>,
    pub router: Arc<Router>,
    pub rate_limiters: HashMap<String, Arc<dyn RateLimiter>>,
    pub retry_policy: RetryPolicy,
    pub callbacks: Arc<CallbackDispatcher>,
    pub middlewares: parking_lot::RwLock<Vec<Arc<dyn Middleware>>>,
    pub in_flight: DashMap<String, InFlightSlot>,
    /// Handles that requested cancellation before dispatch reached them;
    /// consumed by the worker the moment it dequeues the item (spec §5
    /// "cancel-requested flag the worker checks between targets").
    pub cancel_flags: DashSet<String>,
    pub item_deadline: Duration,
    /// Cancelled once `Hub::shutdown` begins. Unlike a worker's per-item
    /// deadline token, this one never aborts an item already in flight —
    /// it only unblocks an idle `dequeue` so the worker can notice
    /// draining has started and exit its loop (spec §5 two-phase
    /// shutdown).
    pub draining: CancellationToken,
}

impl Shared {
    pub fn resolve(&self, message_id: &str) {
        if let Some((_, slot)) = self.in_flight.remove(message_id) {
            let _ = slot.tx.send(Some(slot.receipt));
        }
    }
}
