use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::target::Target;

/// Rendering format of a message body, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    Text,
    Markdown,
    Html,
    Card,
}

impl Default for MessageFormat {
    fn default() -> Self {
        MessageFormat::Text
    }
}

/// A structured message handed to the `Hub` for dispatch.
///
/// Once accepted by `Hub::send`/`send_async`, a `Message` is never mutated
/// again — per-attempt state lives on the `QueueItem` and `SendResult`
/// instead (spec §3, "Lifecycle").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub title: String,
    pub body: String,
    pub format: MessageFormat,
    /// 1 (lowest) .. 5 (urgent).
    pub priority: u8,
    pub variables: HashMap<String, serde_json::Value>,
    pub metadata: HashMap<String, String>,
    pub template: Option<String>,
    #[serde(with = "duration_millis")]
    pub delay: Duration,
    pub targets: Vec<Target>,
    pub created_at: DateTime<Utc>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            body: String::new(),
            format: MessageFormat::default(),
            priority: 3,
            variables: HashMap::new(),
            metadata: HashMap::new(),
            template: None,
            delay: Duration::ZERO,
            targets: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl Message {
    /// Assigns a fresh id and `created_at` if the caller left them unset.
    /// Called once by the hub at acceptance time; never again afterwards.
    pub fn finalize(mut self) -> Self {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        self
    }

    /// spec §3: "a message is deliverable iff at least one of {title, body}
    /// is non-empty AND targets is non-empty".
    pub fn is_deliverable(&self) -> bool {
        (!self.title.is_empty() || !self.body.is_empty()) && !self.targets.is_empty()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetType;

    #[test]
    fn finalize_assigns_id_once() {
        let msg = Message::default().finalize();
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn deliverable_requires_content_and_targets() {
        let mut msg = Message::default();
        assert!(!msg.is_deliverable());
        msg.body = "hello".into();
        assert!(!msg.is_deliverable());
        msg.targets.push(Target::new(TargetType::Webhook, "x"));
        assert!(msg.is_deliverable());
    }
}
