//! A light extension hook for cross-cutting concerns (structured logging,
//! extra metrics) around a target dispatch — NOT the mechanism routing,
//! rate limiting, or retry run through. Those stay built-in pipeline
//! stages in `worker`, matching this workspace's fixed worker-loop shape
//! more closely than a generic plugin chain the core doesn't otherwise
//! need (see DESIGN.md).

use async_trait::async_trait;
use nh_core::{Message, SendResult, Target};

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before_send(&self, _message: &Message, _target: &Target) {}

    async fn after_send(&self, _message: &Message, _target: &Target, _result: &SendResult) {}
}
