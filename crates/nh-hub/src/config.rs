use std::collections::HashMap;
use std::time::Duration;

use nh_router::RoutingRule;
use nh_transport::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Per-platform token bucket, or none (spec §4.7). `rps: 0` degenerates to
/// the never-admits `BlockingLimiter` boundary case (spec §8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub rps: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub buffer_size: usize,
    #[serde(with = "retry_policy_ser")]
    pub retry: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            retry: RetryPolicy::default_policy(),
        }
    }
}

/// The single nested config struct the `Hub` constructor consumes (spec
/// §6). Options this core doesn't use (a stream-backed queue's consumer
/// group sub-options) aren't modeled; `transport_config` is carried
/// opaquely for a caller-supplied transport factory, same as the source's
/// `transport_config: {platform_name → blob}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub workers: usize,
    pub queue: QueueConfig,
    pub rate_limits: HashMap<String, RateLimitConfig>,
    pub routing: Vec<RoutingRule>,
    #[serde(with = "duration_millis")]
    pub scheduler_tick: Duration,
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,
    /// Per-item dequeue+dispatch deadline (spec §4.5, default 30s).
    #[serde(with = "duration_millis")]
    pub item_deadline: Duration,
    /// Callback dispatcher's own bounded pool size (spec §4.8, default 4).
    pub callback_concurrency: usize,
    #[serde(default)]
    pub transport_config: HashMap<String, serde_json::Value>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue: QueueConfig::default(),
            rate_limits: HashMap::new(),
            routing: Vec::new(),
            scheduler_tick: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(30),
            item_deadline: Duration::from_secs(30),
            callback_concurrency: 4,
            transport_config: HashMap::new(),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod retry_policy_ser {
    use super::*;
    use serde::{Deserializer, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        max_retries: u32,
        initial_interval_ms: u64,
        multiplier: f64,
        max_jitter_ms: u64,
    }

    pub fn serialize<S: Serializer>(p: &RetryPolicy, s: S) -> Result<S::Ok, S::Error> {
        Wire {
            max_retries: p.max_retries,
            initial_interval_ms: p.initial_interval.as_millis() as u64,
            multiplier: p.multiplier,
            max_jitter_ms: p.max_jitter.as_millis() as u64,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RetryPolicy, D::Error> {
        let w = Wire::deserialize(d)?;
        Ok(RetryPolicy::new(
            w.max_retries,
            Duration::from_millis(w.initial_interval_ms),
            w.multiplier,
            Duration::from_millis(w.max_jitter_ms),
        ))
    }
}
