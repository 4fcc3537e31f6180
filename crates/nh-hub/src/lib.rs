//! The Hub facade crate: wires the Router, Transport Registry, Queue,
//! Scheduler, Worker Pool, and Callback Dispatcher together behind a
//! single entry point (spec §4.9).

mod callback;
mod config;
mod error;
mod handle;
mod hub;
mod middleware;
mod state;
mod worker;

pub use callback::{CallbackDispatcher, CallbackHandler, WebhookCallbackConfig};
pub use config::{HubConfig, QueueConfig, RateLimitConfig};
pub use error::HubError;
pub use handle::{BatchHandle, BatchProgress, Handle};
pub use hub::Hub;
pub use middleware::Middleware;

pub use nh_core::{
    CallbackEvent, CallbackEventKind, Message, MessageFormat, Receipt, BatchReceipt, SendResult, SendStatus, Target,
    TargetType,
};
pub use nh_router::{ActionKind, RuleAction, RuleConditions, RoutingRule};
pub use nh_transport::{Capabilities, RetryPolicy, Transport, TransportError};
