use nh_core::{Message, Target};
use tracing::debug;

use crate::error::RouterError;
use crate::rule::{ActionKind, RoutingRule};

/// Stateless transform: consult priority-ordered rules, restrict/expand a
/// message's targets to specific platforms based on metadata/priority
/// conditions (spec §4.1). Applies only the *first* matching rule, then
/// stops — the source this was distilled from had a comment suggesting
/// fan-through but the behavior actually exercised is "first match wins"
/// (spec §9 Open Question, resolved in favor of first-match to avoid
/// duplicate enqueues for one message).
pub struct Router {
    rules: Vec<RoutingRule>,
}

impl Router {
    pub fn new(mut rules: Vec<RoutingRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// Returns the routed target set, or `RouterError::NoEligibleTargets`
    /// if it comes out empty (spec §4.1 "Failure semantics" — routing
    /// itself is pure and cannot fail any other way).
    pub fn route(&self, message: &Message) -> Result<Vec<Target>, RouterError> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.matches(message.priority, &message.metadata));

        let routed = match rule {
            Some(rule) => {
                debug!(rule = %rule.name, message_id = %message.id, "routing rule matched");
                apply_rule(rule, &message.targets)
            }
            None => message.targets.clone(),
        };

        if routed.is_empty() {
            Err(RouterError::NoEligibleTargets)
        } else {
            Ok(routed)
        }
    }
}

fn apply_rule(rule: &RoutingRule, targets: &[Target]) -> Vec<Target> {
    let Some(action) = rule.actions.iter().find(|a| a.kind == ActionKind::Route) else {
        return targets.to_vec();
    };

    targets
        .iter()
        .filter_map(|target| {
            if target.platform.is_empty() {
                let mut target = target.clone();
                target.platform = action.platforms.first().cloned().unwrap_or_default();
                Some(target)
            } else if action.platforms.iter().any(|p| p == &target.platform) {
                Some(target.clone())
            } else {
                None
            }
        })
        .collect()
}
