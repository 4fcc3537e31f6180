//! NotifyHub core data model.
//!
//! This crate has no knowledge of queues, transports, or the worker pool —
//! it only defines the values that flow between them: `Message`, `Target`,
//! per-attempt `SendResult`s, the terminal `Receipt`, and the shared error
//! vocabulary every other `nh-*` crate builds on.

pub mod error;
pub mod event;
pub mod message;
pub mod queue_item;
pub mod receipt;
pub mod result;
pub mod target;

pub use error::{CoreError, Retriable, ValidationError};
pub use event::{CallbackEvent, CallbackEventKind};
pub use message::{Message, MessageFormat};
pub use queue_item::QueueItem;
pub use receipt::{BatchReceipt, Receipt};
pub use result::{SendResult, SendStatus};
pub use target::{Target, TargetType};

pub type Result<T> = std::result::Result<T, CoreError>;
