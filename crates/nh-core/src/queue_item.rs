use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::target::Target;

/// The unit the `Queue` and `Scheduler` pass around (spec §3). `targets`
/// may be a subset of `message.targets` after routing, and again a
/// narrower subset still on a retry (only the failed-and-retriable ones
/// survive into the rebuilt `QueueItem`, per spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub message: Message,
    pub targets: Vec<Target>,
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub priority: u8,
}

impl QueueItem {
    pub fn new(message: Message) -> Self {
        let priority = message.priority;
        let targets = message.targets.clone();
        Self {
            message,
            targets,
            attempts: 0,
            next_attempt_at: None,
            priority,
        }
    }
}
