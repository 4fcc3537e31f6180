//! End-to-end scenarios through the `Hub` facade, exercising the full
//! Router -> Queue/Scheduler -> Worker Pool -> Transport pipeline with
//! `MockTransport` standing in for real delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nh_hub::{
    Capabilities, Hub, HubConfig, Message, MessageFormat, QueueConfig, RateLimitConfig, RetryPolicy, RoutingRule,
    SendResult, SendStatus, Target, TargetType, Transport, TransportError,
};
use nh_router::{ActionKind, RuleAction, RuleConditions};
use nh_transport::{MockOutcome, MockTransport};
use tokio_util::sync::CancellationToken;

/// Bounds a test's wait on a `Handle`/`BatchHandle` so a regression hangs
/// the test instead of the whole suite.
fn ctx(ms: u64) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        child.cancel();
    });
    token
}

fn config(workers: usize) -> HubConfig {
    HubConfig {
        workers,
        queue: QueueConfig {
            buffer_size: 64,
            retry: RetryPolicy::new(3, Duration::from_millis(10), 1.0, Duration::ZERO),
        },
        scheduler_tick: Duration::from_millis(5),
        item_deadline: Duration::from_secs(5),
        ..HubConfig::default()
    }
}

fn message(body: &str, targets: Vec<Target>) -> Message {
    Message {
        body: body.into(),
        format: MessageFormat::Text,
        priority: 3,
        targets,
        ..Message::default()
    }
}

#[tokio::test]
async fn s1_happy_path() {
    let hub = Hub::new(config(2));
    hub.register_transport(Arc::new(MockTransport::always_sent("mock"))).unwrap();

    let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("mock");
    let receipt = hub.send(ctx(1000), message("hello", vec![target])).await.unwrap();

    assert_eq!(receipt.sent, 1);
    assert_eq!(receipt.failed, 0);
    assert!(receipt.is_complete());
}

#[tokio::test]
async fn s2_retry_then_succeed() {
    let hub = Hub::new(config(1));
    let transport = MockTransport::new("mock", vec![MockOutcome::Fail("transient".into()), MockOutcome::Sent]);
    hub.register_transport(Arc::new(transport)).unwrap();

    let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("mock");
    let receipt = hub.send(ctx(2000), message("retry me", vec![target])).await.unwrap();

    assert_eq!(receipt.sent, 1);
    assert_eq!(receipt.failed, 0);
    // two SendResult entries survive: the failed attempt and the one that succeeded
    assert_eq!(receipt.results.len(), 2);
}

#[tokio::test]
async fn s3_delayed_message_still_resolves() {
    let hub = Hub::new(config(1));
    hub.register_transport(Arc::new(MockTransport::always_sent("mock"))).unwrap();

    let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("mock");
    let mut msg = message("later", vec![target]);
    msg.delay = Duration::from_millis(50);

    let started = tokio::time::Instant::now();
    let receipt = hub.send(ctx(2000), msg).await.unwrap();
    assert_eq!(receipt.sent, 1);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn s4_fan_out_with_routing() {
    let rule = RoutingRule {
        name: "priority-route".into(),
        priority: 10,
        enabled: true,
        conditions: RuleConditions {
            priorities: Some([5].into_iter().collect()),
            metadata: None,
            message_types: None,
        },
        actions: vec![RuleAction {
            kind: ActionKind::Route,
            platforms: vec!["feishu".into(), "email".into()],
        }],
    };

    let hub = Hub::new(HubConfig {
        routing: vec![rule],
        ..config(2)
    });
    hub.register_transport(Arc::new(MockTransport::always_sent("feishu"))).unwrap();
    hub.register_transport(Arc::new(MockTransport::always_sent("email"))).unwrap();
    hub.register_transport(Arc::new(MockTransport::always_sent("slack"))).unwrap();

    let mut msg = message("fan out", Vec::new());
    msg.priority = 5;
    msg.targets.push(Target::new(TargetType::Email, "a@b.com").with_platform(""));
    msg.targets.push(Target::new(TargetType::Group, "g").with_platform("feishu"));
    msg.targets.push(Target::new(TargetType::Channel, "c").with_platform("slack"));

    let receipt = hub.send(ctx(1000), msg).await.unwrap();
    assert_eq!(receipt.total, 2);
    assert_eq!(receipt.sent, 2);
}

#[tokio::test]
async fn s5_batch_progress_is_monotonic() {
    let hub = Hub::new(config(3));
    hub.register_transport(Arc::new(MockTransport::always_sent("mock"))).unwrap();

    let messages: Vec<Message> = (0..5)
        .map(|i| {
            let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("mock");
            message(&format!("batch-{i}"), vec![target])
        })
        .collect();

    let batch = hub.send_batch(ctx(2000), messages).await.unwrap();
    let mut progress_rx = batch.progress();
    let mut last_completed = 0;

    loop {
        let snapshot = progress_rx.borrow().clone();
        assert!(snapshot.completed >= last_completed);
        last_completed = snapshot.completed;
        if snapshot.completed == snapshot.total {
            break;
        }
        if progress_rx.changed().await.is_err() {
            break;
        }
    }

    let batch_receipt = batch.wait(ctx(2000)).await.unwrap();
    assert_eq!(batch_receipt.total(), 5);
    assert_eq!(batch_receipt.completed(), 5);
}

/// A transport that takes a fixed amount of time per send, used to prove
/// shutdown waits for in-flight sends instead of aborting them.
struct SlowTransport {
    delay: Duration,
}

#[async_trait]
impl Transport for SlowTransport {
    fn name(&self) -> &str {
        "slow"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supported_target_types: vec![TargetType::Webhook],
            supported_formats: vec![MessageFormat::Text],
            max_message_size: 1 << 20,
            supports_scheduling: false,
            supports_attachments: false,
            supports_rich_content: false,
        }
    }

    fn validate_target(&self, _target: &Target) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, _ctx: CancellationToken, message: &Message, target: &Target) -> SendResult {
        tokio::time::sleep(self.delay).await;
        let mut result = SendResult::started(&message.id, target.clone(), 1);
        result.finish(SendStatus::Sent, "slow", None, None);
        result
    }

    async fn is_healthy(&self, _ctx: CancellationToken) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn s6_shutdown_drains_in_flight_work() {
    let hub = Hub::new(config(3));
    hub.register_transport(Arc::new(SlowTransport {
        delay: Duration::from_millis(100),
    }))
    .unwrap();

    let mut handles = Vec::new();
    for i in 0..3 {
        let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("slow");
        let h = hub.send_async(ctx(1000), message(&format!("slow-{i}"), vec![target])).await.unwrap();
        handles.push(h);
    }

    // give the workers a moment to pick the items up before draining starts
    tokio::time::sleep(Duration::from_millis(10)).await;

    hub.shutdown(ctx(500)).await.unwrap();

    for h in handles {
        let receipt = h.wait(ctx(10)).await.unwrap();
        assert_eq!(receipt.sent, 1);
    }
}

#[tokio::test]
async fn unknown_platform_target_fails_without_retry() {
    let hub = Hub::new(config(1));
    let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("nonexistent");
    let receipt = hub.send(ctx(1000), message("nope", vec![target])).await.unwrap();
    assert_eq!(receipt.failed, 1);
    assert_eq!(receipt.sent, 0);
}

#[tokio::test]
async fn rate_limit_zero_rps_blocks_until_context_cancelled() {
    let mut cfg = config(1);
    cfg.item_deadline = Duration::from_millis(50);
    let mut limits = HashMap::new();
    limits.insert("mock".to_string(), RateLimitConfig { rps: 0, burst: 1 });
    cfg.rate_limits = limits;
    let hub = Hub::new(cfg);
    hub.register_transport(Arc::new(MockTransport::always_sent("mock"))).unwrap();

    // the per-item deadline (50ms) cancels the blocking limiter before the
    // caller's own wait budget (500ms) runs out.
    let target = Target::new(TargetType::Webhook, "https://example.com").with_platform("mock");
    let receipt = hub.send(ctx(500), message("blocked", vec![target])).await.unwrap();
    assert_eq!(receipt.failed, 1);
}
