//! Async-result objects (spec §4.9, glossary): a future/promise-like
//! completion signal plus a subscriber list, with subscriber notification
//! kept off the critical send path (spec §9 "Async handles").

use std::sync::Arc;

use nh_core::{BatchReceipt, Receipt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::HubError;
use crate::state::Shared;

/// A caller-side handle to one in-flight `send_async` submission.
#[derive(Clone)]
pub struct Handle {
    id: String,
    rx: watch::Receiver<Option<Receipt>>,
    shared: Arc<Shared>,
}

impl Handle {
    pub(crate) fn new(id: String, rx: watch::Receiver<Option<Receipt>>, shared: Arc<Shared>) -> Self {
        Self { id, rx, shared }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Blocks until the `Receipt` resolves or `ctx` is cancelled.
    pub async fn wait(&self, ctx: CancellationToken) -> Result<Receipt, HubError> {
        let mut rx = self.rx.clone();
        loop {
            if let Some(receipt) = rx.borrow().clone() {
                return Ok(receipt);
            }
            tokio::select! {
                changed = rx.changed() => {
                    changed.map_err(|_| HubError::ContextCancelled)?;
                }
                _ = ctx.cancelled() => return Err(HubError::ContextCancelled),
            }
        }
    }

    /// Registers a one-shot callback fired once the `Receipt` resolves,
    /// regardless of outcome. Runs on its own task so a slow callback
    /// can never delay another caller's `wait`.
    pub fn on_complete<F: FnOnce(Receipt) + Send + 'static>(&self, f: F) {
        let mut rx = self.rx.clone();
        tokio::spawn(async move {
            loop {
                if let Some(receipt) = rx.borrow().clone() {
                    f(receipt);
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        });
    }

    /// Like [`Handle::on_complete`] but only fires when the resolved
    /// `Receipt` has at least one failed target.
    pub fn on_error<F: FnOnce(Receipt) + Send + 'static>(&self, f: F) {
        self.on_complete(move |receipt| {
            if receipt.failed > 0 {
                f(receipt);
            }
        });
    }

    /// Requests cancellation. Pre-dispatch, this removes the item from
    /// the `Scheduler` if it's still sitting there; otherwise it sets the
    /// cancel-requested flag the worker checks before dispatching each
    /// target (spec §5).
    pub fn cancel(&self) {
        self.shared.scheduler.cancel(&self.id);
        self.shared.cancel_flags.insert(self.id.clone());
    }
}

/// Progress snapshot for a `send_batch` submission (spec §4.9, scenario S5).
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub current_message_id: Option<String>,
}

/// Handle to a `send_batch` submission: per-message handles plus a
/// monotonically non-decreasing progress stream.
pub struct BatchHandle {
    handles: Vec<Handle>,
    progress_rx: watch::Receiver<BatchProgress>,
}

impl BatchHandle {
    pub(crate) fn new(handles: Vec<Handle>) -> Self {
        let total = handles.len();
        let (tx, rx) = watch::channel(BatchProgress {
            completed: 0,
            total,
            current_message_id: None,
        });

        let watchers = handles.clone();
        tokio::spawn(async move {
            let (done_tx, mut done_rx) = mpsc::unbounded_channel();
            for handle in &watchers {
                let handle = handle.clone();
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let id = handle.id().to_string();
                    if let Err(e) = handle.wait(CancellationToken::new()).await {
                        warn!(message_id = %id, error = %e, "batch member failed to resolve");
                    }
                    let _ = done_tx.send(id);
                });
            }
            drop(done_tx);

            let mut completed = 0;
            while let Some(message_id) = done_rx.recv().await {
                completed += 1;
                let _ = tx.send(BatchProgress {
                    completed,
                    total,
                    current_message_id: Some(message_id),
                });
            }
        });

        Self { handles, progress_rx: rx }
    }

    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress_rx.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.id().to_string()).collect()
    }

    pub async fn wait(&self, ctx: CancellationToken) -> Result<BatchReceipt, HubError> {
        let mut receipts = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            receipts.push(handle.wait(ctx.clone()).await?);
        }
        Ok(BatchReceipt { receipts })
    }
}
