use serde::{Deserialize, Serialize};

use crate::result::{SendResult, SendStatus};

/// Terminal outcome record for one submitted message (spec §3).
///
/// Exactly one `Receipt` eventually resolves per submitted message (spec
/// §8); callers observe it either by awaiting a `Handle` or by reading the
/// snapshot a `CallbackEvent` carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub message_id: String,
    pub total: u32,
    pub sent: u32,
    pub failed: u32,
    pub results: Vec<SendResult>,
}

impl Receipt {
    pub fn pending(message_id: impl Into<String>, total: u32) -> Self {
        Self {
            message_id: message_id.into(),
            total,
            sent: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    /// Recomputes `sent`/`failed` from the terminal entries currently in
    /// `results` — one target may have several non-terminal entries (the
    /// retries) before its terminal one, so counts are derived rather than
    /// incremented as results are appended.
    pub fn recompute(&mut self) {
        use std::collections::HashMap;

        let mut terminal_by_target: HashMap<String, SendStatus> = HashMap::new();
        for r in &self.results {
            if matches!(r.status, SendStatus::Sent | SendStatus::Failed | SendStatus::Cancelled) {
                terminal_by_target.insert(r.target.to_string(), r.status);
            }
        }
        self.sent = terminal_by_target
            .values()
            .filter(|s| matches!(s, SendStatus::Sent))
            .count() as u32;
        self.failed = terminal_by_target
            .values()
            .filter(|s| matches!(s, SendStatus::Failed | SendStatus::Cancelled))
            .count() as u32;
    }

    pub fn is_complete(&self) -> bool {
        self.sent + self.failed >= self.total
    }
}

/// A batch submission's receipts plus a way to observe progress (spec
/// §4.9 `send_batch`). The progress stream itself is produced by `nh-hub`;
/// this struct is the batch's final, resolved state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub receipts: Vec<Receipt>,
}

impl BatchReceipt {
    pub fn total(&self) -> usize {
        self.receipts.len()
    }

    pub fn completed(&self) -> usize {
        self.receipts.iter().filter(|r| r.is_complete()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Target, TargetType};

    #[test]
    fn recompute_counts_terminal_entries_only() {
        let mut r = Receipt::pending("m1", 1);
        let target = Target::new(TargetType::Webhook, "x");
        let mut a1 = SendResult::started("m1", target.clone(), 1);
        a1.finish(SendStatus::Failed, "mock", Some("boom".into()), None);
        let mut a2 = SendResult::started("m1", target, 2);
        a2.finish(SendStatus::Sent, "mock", None, None);
        r.results.push(a1);
        r.results.push(a2);
        r.recompute();
        assert_eq!(r.sent, 1);
        assert_eq!(r.failed, 0);
        assert!(r.is_complete());
    }
}
