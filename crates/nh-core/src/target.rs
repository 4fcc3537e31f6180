use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kind of destination a `Target` points at, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Email,
    Phone,
    User,
    Group,
    Channel,
    Webhook,
    Sms,
}

impl TargetType {
    fn tag(self) -> &'static str {
        match self {
            TargetType::Email => "email",
            TargetType::Phone => "phone",
            TargetType::User => "user",
            TargetType::Group => "group",
            TargetType::Channel => "channel",
            TargetType::Webhook => "webhook",
            TargetType::Sms => "sms",
        }
    }
}

impl FromStr for TargetType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(TargetType::Email),
            "phone" => Ok(TargetType::Phone),
            "user" => Ok(TargetType::User),
            "group" => Ok(TargetType::Group),
            "channel" => Ok(TargetType::Channel),
            "webhook" => Ok(TargetType::Webhook),
            "sms" => Ok(TargetType::Sms),
            other => Err(ValidationError::new("target.type", format!("unknown target type: {other}"))),
        }
    }
}

/// A single delivery destination.
///
/// `platform` may be empty until the (out-of-scope) resolver or the
/// `Router` fills it in; it must be non-empty and name a registered
/// transport by the time a worker dispatches to it (spec §3 invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub value: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Target {
    pub fn new(target_type: TargetType, value: impl Into<String>) -> Self {
        Self {
            target_type,
            value: value.into(),
            platform: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }
}

/// Canonical textual form: `type:value[@platform][;k=v,...]`. `Display`
/// and `FromStr` are exact inverses (spec §8 round-trip law), independent
/// of the (out-of-scope) resolver's looser input syntax like `"@user"`.
impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type.tag(), self.value)?;
        if !self.platform.is_empty() {
            write!(f, "@{}", self.platform)?;
        }
        if !self.metadata.is_empty() {
            write!(f, ";")?;
            let mut first = true;
            for (k, v) in &self.metadata {
                if !first {
                    write!(f, ",")?;
                }
                write!(f, "{k}={v}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for Target {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, metadata_part) = match s.split_once(';') {
            Some((h, m)) => (h, Some(m)),
            None => (s, None),
        };
        let (type_value, platform) = match head.split_once('@') {
            Some((tv, p)) => (tv, p.to_string()),
            None => (head, String::new()),
        };
        let (type_str, value) = type_value
            .split_once(':')
            .ok_or_else(|| ValidationError::new("target", format!("missing ':' in target expression: {s}")))?;
        let target_type = type_str.parse()?;

        let mut metadata = BTreeMap::new();
        if let Some(m) = metadata_part {
            for pair in m.split(',') {
                if pair.is_empty() {
                    continue;
                }
                let (k, v) = pair.split_once('=').ok_or_else(|| {
                    ValidationError::new("target.metadata", format!("malformed metadata pair: {pair}"))
                })?;
                metadata.insert(k.to_string(), v.to_string());
            }
        }

        Ok(Target {
            target_type,
            value: value.to_string(),
            platform,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_minimal() {
        let t = Target::new(TargetType::Webhook, "https://example.com/hook");
        let parsed: Target = t.to_string().parse().unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn round_trips_with_platform_and_metadata() {
        let mut t = Target::new(TargetType::Email, "a@b.com").with_platform("email");
        t.metadata.insert("cc".into(), "true".into());
        let s = t.to_string();
        let parsed: Target = s.parse().unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!("not-a-target".parse::<Target>().is_err());
    }
}
