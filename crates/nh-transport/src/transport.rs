use async_trait::async_trait;
use nh_core::{Message, MessageFormat, SendResult, Target, TargetType};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// What a `Transport` declares it can do, checked by the registry at
/// registration time and by the worker before routing a target to it
/// (spec §4.2).
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub supported_target_types: Vec<TargetType>,
    pub supported_formats: Vec<MessageFormat>,
    pub max_message_size: usize,
    pub supports_scheduling: bool,
    pub supports_attachments: bool,
    pub supports_rich_content: bool,
}

impl Capabilities {
    /// The registry rejects a transport whose capabilities are internally
    /// inconsistent at registration time.
    pub fn is_sane(&self) -> bool {
        !self.supported_target_types.is_empty()
            && !self.supported_formats.is_empty()
            && self.max_message_size > 0
    }
}

/// The extension point for a delivery platform (spec §4.2, §6). The core
/// never implements a specific vendor's wire format against this trait —
/// `WebhookTransport` in this crate is the one generic, vendor-neutral
/// implementation; everything SMTP/Feishu/Slack-specific is out of scope.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identifier used as the registry key and `Target::platform`.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn validate_target(&self, target: &Target) -> Result<(), TransportError>;

    /// Must be safe to call concurrently from multiple workers.
    async fn send(&self, ctx: CancellationToken, message: &Message, target: &Target) -> SendResult;

    async fn is_healthy(&self, ctx: CancellationToken) -> Result<(), TransportError>;

    /// Idempotent; called by the registry on shutdown.
    async fn close(&self) -> Result<(), TransportError>;
}
