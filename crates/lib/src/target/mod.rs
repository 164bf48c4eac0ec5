//! Target definitions.
//!
//! A target is the unit of orchestration: identity, dependency and trigger
//! edges, preconditions, an optional partition spec, an artifact contract, a
//! failure policy and a body.

pub mod body;
mod types;

pub use body::{BodyContext, BodyError, BodyFn, BoxFuture};
pub use types::{Consume, Target, TargetBuilder};
