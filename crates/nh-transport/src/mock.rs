//! In-memory `Transport` used by `nh-hub`'s integration tests to exercise
//! the dispatch pipeline without real network I/O (mirrors
//! `fc-stream::mock::MockStreamWatcher`'s role for its crate).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use nh_core::{Message, MessageFormat, SendResult, SendStatus, Target, TargetType};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::transport::{Capabilities, Transport};

/// One scripted outcome for a call to `MockTransport::send`.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Sent,
    Fail(String),
}

/// A transport whose outcomes are scripted in advance, one per call
/// (calls past the end of the script repeat the last scripted outcome).
/// Records
/// every `(message_id, target_value)` it was asked to send, in order.
pub struct MockTransport {
    name: String,
    script: Vec<MockOutcome>,
    call_index: AtomicUsize,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new(name: impl Into<String>, script: Vec<MockOutcome>) -> Self {
        Self {
            name: name.into(),
            script,
            call_index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always succeeds.
    pub fn always_sent(name: impl Into<String>) -> Self {
        Self::new(name, vec![MockOutcome::Sent])
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supported_target_types: vec![
                TargetType::Webhook,
                TargetType::Email,
                TargetType::User,
                TargetType::Group,
                TargetType::Channel,
                TargetType::Phone,
                TargetType::Sms,
            ],
            supported_formats: vec![
                MessageFormat::Text,
                MessageFormat::Markdown,
                MessageFormat::Html,
                MessageFormat::Card,
            ],
            max_message_size: 1 << 20,
            supports_scheduling: true,
            supports_attachments: true,
            supports_rich_content: true,
        }
    }

    fn validate_target(&self, _target: &Target) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, _ctx: CancellationToken, message: &Message, target: &Target) -> SendResult {
        self.calls.lock().unwrap().push((message.id.clone(), target.value.clone()));

        let index = self.call_index.fetch_add(1, Ordering::SeqCst);
        let outcome = if self.script.is_empty() {
            &MockOutcome::Sent
        } else {
            &self.script[index.min(self.script.len() - 1)]
        };

        let mut result = SendResult::started(&message.id, target.clone(), 1);
        match outcome {
            MockOutcome::Sent => result.finish(SendStatus::Sent, &self.name, None, None),
            MockOutcome::Fail(reason) => result.finish(SendStatus::Failed, &self.name, Some(reason.clone()), None),
        }
        result
    }

    async fn is_healthy(&self, _ctx: CancellationToken) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
