//! Routing rule matching (spec §4.1): a stateless transform from a
//! message's declared targets to the subset eligible after the first
//! matching rule has been applied.

pub mod error;
pub mod router;
pub mod rule;

pub use error::RouterError;
pub use router::Router;
pub use rule::{ActionKind, RuleAction, RuleConditions, RoutingRule};
