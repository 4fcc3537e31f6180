use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A conditional instruction restricting a message's target set to a
/// subset of platforms (spec §4.1, glossary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
    pub conditions: RuleConditions,
    pub actions: Vec<RuleAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    pub priorities: Option<HashSet<u8>>,
    pub metadata: Option<HashMap<String, String>>,
    pub message_types: Option<HashSet<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    pub kind: ActionKind,
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Route,
}

impl RoutingRule {
    /// All present condition groups must match (AND); an absent group is
    /// vacuously satisfied (spec §4.1).
    pub fn matches(&self, priority: u8, metadata: &HashMap<String, String>) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(priorities) = &self.conditions.priorities {
            if !priorities.contains(&priority) {
                return false;
            }
        }
        if let Some(required) = &self.conditions.metadata {
            if !required.iter().all(|(k, v)| metadata.get(k).map(|mv| mv == v).unwrap_or(false)) {
                return false;
            }
        }
        if let Some(types) = &self.conditions.message_types {
            match metadata.get("type") {
                Some(t) if types.contains(t) => {}
                _ => return false,
            }
        }
        true
    }
}
