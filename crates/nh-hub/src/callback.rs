//! Callback Dispatcher (spec §4.8): fires `Sent`/`Failed`/`Retry`/`MaxRetries`
//! events at registered handlers with bounded concurrency. Signing reuses
//! `nh_transport`'s HMAC helper the same way `WebhookTransport` signs outbound
//! deliveries — a callback webhook is just another signed `POST`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use nh_core::{CallbackEvent, CallbackEventKind};
use parking_lot::RwLock;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Error, Debug)]
enum CallbackError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("non-success status {0}")]
    NonSuccess(u16),
}

#[derive(Clone)]
pub struct WebhookCallbackConfig {
    pub url: String,
    pub secret: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub enum CallbackHandler {
    Function(Arc<dyn Fn(CallbackEvent) -> BoxFuture<'static, ()> + Send + Sync>),
    Webhook(WebhookCallbackConfig),
}

/// Runs registered handlers in its own bounded pool (default 4 workers);
/// failures are swallowed and metric-counted, never propagated back into
/// the delivery pipeline (spec §4.8).
pub struct CallbackDispatcher {
    handlers: RwLock<HashMap<CallbackEventKind, Vec<CallbackHandler>>>,
    client: Client,
    semaphore: Arc<Semaphore>,
}

impl CallbackDispatcher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            client: Client::new(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn register(&self, kind: CallbackEventKind, handler: CallbackHandler) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Fire-and-forget: spawns one bounded task per matching handler and
    /// returns immediately, so a slow or unreachable callback endpoint
    /// never stalls a worker's delivery loop.
    pub fn dispatch(&self, event: CallbackEvent) {
        let handlers = self.handlers.read().get(&event.kind).cloned().unwrap_or_default();
        for handler in handlers {
            let semaphore = self.semaphore.clone();
            let client = self.client.clone();
            let event = event.clone();
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = match &handler {
                    CallbackHandler::Function(f) => {
                        f(event.clone()).await;
                        Ok(())
                    }
                    CallbackHandler::Webhook(cfg) => Self::post_webhook(&client, cfg, &event).await,
                };
                if let Err(e) = result {
                    warn!(message_id = %event.message_id, kind = ?event.kind, error = %e, "callback delivery failed");
                    metrics::counter!("notifyhub.callback.failed_total").increment(1);
                }
            });
        }
    }

    async fn post_webhook(client: &Client, cfg: &WebhookCallbackConfig, event: &CallbackEvent) -> Result<(), CallbackError> {
        let body = serde_json::to_string(event)?;
        let mut request = client
            .post(&cfg.url)
            .timeout(cfg.timeout)
            .header("Content-Type", "application/json");
        if let Some(secret) = &cfg.secret {
            let (signature, timestamp) = nh_transport::sign(&body, secret);
            request = request
                .header(nh_transport::SIGNATURE_HEADER, signature)
                .header(nh_transport::TIMESTAMP_HEADER, timestamp);
        }
        let response = request.body(body).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CallbackError::NonSuccess(response.status().as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nh_core::Receipt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> CallbackEvent {
        CallbackEvent {
            kind: CallbackEventKind::Sent,
            message_id: "m1".into(),
            attempt: 1,
            duration_ms: Some(5),
            error: None,
            receipt: Receipt::pending("m1", 1),
        }
    }

    #[tokio::test]
    async fn function_handler_runs() {
        let dispatcher = CallbackDispatcher::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        dispatcher.register(
            CallbackEventKind::Sent,
            CallbackHandler::Function(Arc::new(move |_e| {
                let count = count2.clone();
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            })),
        );
        dispatcher.dispatch(event());
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn webhook_handler_posts_signed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dispatcher = CallbackDispatcher::new(4);
        dispatcher.register(
            CallbackEventKind::Sent,
            CallbackHandler::Webhook(WebhookCallbackConfig {
                url: format!("{}/cb", server.uri()),
                secret: Some("s3cret".into()),
                timeout: StdDuration::from_secs(5),
            }),
        );
        dispatcher.dispatch(event());
        tokio::time::sleep(StdDuration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn failing_webhook_does_not_panic() {
        let dispatcher = CallbackDispatcher::new(4);
        dispatcher.register(
            CallbackEventKind::Failed,
            CallbackHandler::Webhook(WebhookCallbackConfig {
                url: "http://127.0.0.1:1/unreachable".into(),
                secret: None,
                timeout: StdDuration::from_millis(100),
            }),
        );
        let mut e = event();
        e.kind = CallbackEventKind::Failed;
        dispatcher.dispatch(e);
        tokio::time::sleep(StdDuration::from_millis(200)).await;
    }
}
