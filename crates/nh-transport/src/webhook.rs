//! `WebhookTransport` — the one concrete, vendor-neutral `Transport` this
//! crate ships. Delivers to any HTTP endpoint via `POST`, optionally
//! signing the body with HMAC-SHA256 the same way `fc-router`'s
//! `HttpMediator` signs outbound webhook calls. Platform-specific wire
//! formats (SMTP, Feishu, Slack block kit) are out of scope (spec §1).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nh_core::{Message, SendResult, SendStatus, Target, TargetType};
use reqwest::Client;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::signing::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::transport::{Capabilities, Transport};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    message_id: &'a str,
    title: &'a str,
    body: &'a str,
    format: &'a str,
}

pub struct WebhookTransportConfig {
    pub request_timeout: Duration,
}

impl Default for WebhookTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct WebhookTransport {
    name: String,
    client: Client,
    closed: AtomicBool,
}

impl WebhookTransport {
    pub fn new(name: impl Into<String>, config: WebhookTransportConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client builds with a well-formed config");
        Self {
            name: name.into(),
            client,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supported_target_types: vec![TargetType::Webhook],
            supported_formats: vec![
                nh_core::MessageFormat::Text,
                nh_core::MessageFormat::Markdown,
                nh_core::MessageFormat::Html,
                nh_core::MessageFormat::Card,
            ],
            max_message_size: 1 << 20,
            supports_scheduling: false,
            supports_attachments: false,
            supports_rich_content: true,
        }
    }

    fn validate_target(&self, target: &Target) -> Result<(), TransportError> {
        if target.target_type != TargetType::Webhook {
            return Err(TransportError::InvalidTarget(format!(
                "webhook transport cannot handle target type {:?}",
                target.target_type
            )));
        }
        if !(target.value.starts_with("http://") || target.value.starts_with("https://")) {
            return Err(TransportError::InvalidTarget(format!(
                "webhook target value is not a URL: {}",
                target.value
            )));
        }
        Ok(())
    }

    async fn send(&self, ctx: CancellationToken, message: &Message, target: &Target) -> SendResult {
        let mut result = SendResult::started(&message.id, target.clone(), 1);

        if self.closed.load(Ordering::SeqCst) {
            result.finish(SendStatus::Failed, &self.name, Some("transport closed".into()), None);
            return result;
        }

        if let Err(e) = self.validate_target(target) {
            result.finish(SendStatus::Failed, &self.name, Some(e.to_string()), None);
            return result;
        }

        let format_str = format!("{:?}", message.format).to_lowercase();
        let payload = WebhookPayload {
            message_id: &message.id,
            title: &message.title,
            body: &message.body,
            format: &format_str,
        };
        let body = match serde_json::to_string(&payload) {
            Ok(b) => b,
            Err(e) => {
                result.finish(SendStatus::Failed, &self.name, Some(e.to_string()), None);
                return result;
            }
        };

        let mut request = self.client.post(&target.value).header("Content-Type", "application/json");
        if let Some(secret) = target.metadata.get("signing_secret") {
            let (signature, timestamp) = sign(&body, secret);
            request = request.header(SIGNATURE_HEADER, signature).header(TIMESTAMP_HEADER, timestamp);
        }
        request = request.body(body);

        let outcome = tokio::select! {
            resp = request.send() => resp,
            _ = ctx.cancelled() => {
                result.finish(SendStatus::Failed, &self.name, Some("context cancelled".into()), None);
                return result;
            }
        };

        match outcome {
            Ok(resp) if resp.status().is_success() => {
                let status = resp.status().as_u16();
                debug!(platform = %self.name, target = %target.value, status, "webhook delivered");
                result.finish(SendStatus::Sent, &self.name, None, Some(status.to_string()));
            }
            Ok(resp) => {
                let status = resp.status();
                warn!(platform = %self.name, target = %target.value, %status, "webhook rejected");
                result.finish(SendStatus::Failed, &self.name, Some(format!("http status {status}")), None);
            }
            Err(e) => {
                result.finish(SendStatus::Failed, &self.name, Some(e.to_string()), None);
            }
        }
        result
    }

    async fn is_healthy(&self, _ctx: CancellationToken) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> Message {
        Message {
            id: "m1".into(),
            title: "t".into(),
            body: "b".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivers_and_marks_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = WebhookTransport::new("webhook", WebhookTransportConfig::default());
        let target = Target::new(TargetType::Webhook, format!("{}/hook", server.uri()));
        let result = transport.send(CancellationToken::new(), &message(), &target).await;
        assert_eq!(result.status, SendStatus::Sent);
    }

    #[tokio::test]
    async fn signs_when_secret_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = WebhookTransport::new("webhook", WebhookTransportConfig::default());
        let mut target = Target::new(TargetType::Webhook, format!("{}/hook", server.uri()));
        target.metadata.insert("signing_secret".into(), "s3cret".into());
        let result = transport.send(CancellationToken::new(), &message(), &target).await;
        assert_eq!(result.status, SendStatus::Sent);
    }

    #[tokio::test]
    async fn non_2xx_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = WebhookTransport::new("webhook", WebhookTransportConfig::default());
        let target = Target::new(TargetType::Webhook, format!("{}/hook", server.uri()));
        let result = transport.send(CancellationToken::new(), &message(), &target).await;
        assert_eq!(result.status, SendStatus::Failed);
    }

    #[tokio::test]
    async fn rejects_non_webhook_target() {
        let transport = WebhookTransport::new("webhook", WebhookTransportConfig::default());
        let target = Target::new(TargetType::Email, "a@b.com");
        assert!(transport.validate_target(&target).is_err());
    }
}
