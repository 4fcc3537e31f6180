use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::transport::Transport;

/// Name-indexed, thread-safe directory of `Transport` implementations
/// (spec §4.2). Writes take the exclusive lock, reads the shared one —
/// registration and teardown are rare compared to the per-send `get`
/// lookups every worker performs.
pub struct TransportRegistry {
    transports: RwLock<HashMap<String, Arc<dyn Transport>>>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            transports: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, transport: Arc<dyn Transport>) -> Result<(), TransportError> {
        let name = transport.name().to_string();
        if !transport.capabilities().is_sane() {
            return Err(TransportError::InvalidTarget(format!(
                "transport {name} declared inconsistent capabilities"
            )));
        }
        let mut guard = self.transports.write();
        if guard.contains_key(&name) {
            return Err(TransportError::DuplicateName(name));
        }
        info!(platform = %name, "registered transport");
        guard.insert(name, transport);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.read().get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.transports.read().keys().cloned().collect()
    }

    pub async fn health(&self, ctx: CancellationToken) -> HashMap<String, Option<TransportError>> {
        let snapshot: Vec<(String, Arc<dyn Transport>)> = self
            .transports
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let checks = snapshot.into_iter().map(|(name, transport)| {
            let ctx = ctx.clone();
            async move {
                let result = transport.is_healthy(ctx).await.err();
                (name, result)
            }
        });
        futures::future::join_all(checks).await.into_iter().collect()
    }

    /// Closes every registered transport in parallel, returning the first
    /// non-nil error after all have completed (spec §4.2).
    pub async fn close(&self) -> Result<(), TransportError> {
        let snapshot: Vec<Arc<dyn Transport>> = self.transports.read().values().cloned().collect();
        let results = futures::future::join_all(snapshot.iter().map(|t| t.close())).await;
        let mut first_err = None;
        for (transport, result) in snapshot.iter().zip(results) {
            if let Err(e) = result {
                warn!(platform = %transport.name(), error = %e, "transport close failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
