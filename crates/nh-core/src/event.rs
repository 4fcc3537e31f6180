use serde::{Deserialize, Serialize};

use crate::receipt::Receipt;

/// Out-of-band delivery events a caller can subscribe to (spec §4.8,
/// glossary). Fires once per terminal event (`Sent`/`Failed`/`MaxRetries`)
/// and once per `Retry` (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackEventKind {
    Sent,
    Failed,
    Retry,
    MaxRetries,
}

/// The payload handed to a callback. Carries a read-only snapshot of the
/// message's `Receipt` rather than a handle back into the `Hub` — this is
/// deliberate (spec §9, "cyclic graph concern"): a callback has no way to
/// re-enter the hub and cause re-entrancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub kind: CallbackEventKind,
    pub message_id: String,
    pub attempt: u32,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub receipt: Receipt,
}
