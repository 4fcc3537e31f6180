use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::target::Target;

/// Status of a single per-target delivery attempt, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Retrying,
    Cancelled,
}

/// The outcome of one attempt to deliver a message to one target.
///
/// A retried attempt appends a new `SendResult` with an incremented
/// `attempt`; earlier entries for the same target are never mutated (spec
/// §7, "Retries are transparent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub message_id: String,
    pub target: Target,
    pub status: SendStatus,
    pub platform: String,
    pub error: Option<String>,
    pub response: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub attempt: u32,
    /// Whether a `Failed` result is worth retrying. Absent at the wire
    /// boundary defaults to `true` (spec §4.6, "unknown is retriable");
    /// meaningless once `status != Failed`.
    pub retriable: bool,
}

impl SendResult {
    pub fn started(message_id: impl Into<String>, target: Target, attempt: u32) -> Self {
        Self {
            message_id: message_id.into(),
            target,
            status: SendStatus::Sending,
            platform: String::new(),
            error: None,
            response: None,
            started_at: Utc::now(),
            ended_at: None,
            duration: None,
            attempt,
            retriable: true,
        }
    }

    pub fn finish(&mut self, status: SendStatus, platform: impl Into<String>, error: Option<String>, response: Option<String>) {
        let ended_at = Utc::now();
        self.duration = (ended_at - self.started_at).to_std().ok();
        self.ended_at = Some(ended_at);
        self.status = status;
        self.platform = platform.into();
        self.error = error;
        self.response = response;
    }

    /// Marks a finished `Failed` result as non-retriable (e.g. unknown
    /// platform, validation failure). No-op on any other status.
    pub fn mark_not_retriable(mut self) -> Self {
        if self.status == SendStatus::Failed {
            self.retriable = false;
        }
        self
    }

    pub fn is_terminal_success(&self) -> bool {
        matches!(self.status, SendStatus::Sent)
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self.status, SendStatus::Failed | SendStatus::Cancelled)
    }
}
