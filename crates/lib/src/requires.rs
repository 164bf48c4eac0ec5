//! Preconditions evaluated right before a target runs.
//!
//! Requirements are checked in declaration order and evaluation stops at the
//! first one that does not hold, so a failure names exactly one condition.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::Configuration;
use crate::context::RunContext;
use crate::util::glob;

/// A requirement that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("precondition of '{target}' not met: {description}")]
pub struct PreconditionError {
  pub target: String,
  pub description: String,
}

type Predicate = Arc<dyn Fn(&RunContext) -> bool + Send + Sync>;

/// A described boolean check over the run context and its environment.
#[derive(Clone)]
pub struct Requirement {
  description: String,
  predicate: Predicate,
}

impl Requirement {
  pub fn new(description: impl Into<String>, predicate: impl Fn(&RunContext) -> bool + Send + Sync + 'static) -> Self {
    Self {
      description: description.into(),
      predicate: Arc::new(predicate),
    }
  }

  /// The environment variable is set and not blank.
  pub fn env_set(var: impl Into<String>) -> Self {
    let var = var.into();
    let description = format!("environment variable {} is set", var);
    Self::new(description, move |_| {
      std::env::var(&var).map(|v| !v.trim().is_empty()).unwrap_or(false)
    })
  }

  /// The run uses the given build configuration.
  pub fn configuration(expected: Configuration) -> Self {
    Self::new(format!("configuration is {}", expected), move |ctx| {
      ctx.configuration() == expected
    })
  }

  /// The current branch matches one of `patterns` (`*` and `?` allowed).
  pub fn branch(patterns: Vec<String>) -> Self {
    let description = format!("branch matches one of [{}]", patterns.join(", "));
    Self::new(description, move |ctx| {
      ctx
        .repository()
        .branch
        .as_deref()
        .is_some_and(|branch| patterns.iter().any(|p| glob::matches(p, branch)))
    })
  }

  /// The working copy has no uncommitted changes.
  pub fn clean_working_copy() -> Self {
    Self::new("working copy is clean", |ctx| ctx.repository().clean == Some(true))
  }

  /// Replace the description shown when the requirement fails.
  pub fn describe(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  pub fn holds(&self, ctx: &RunContext) -> bool {
    (self.predicate)(ctx)
  }
}

impl fmt::Debug for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Requirement")
      .field("description", &self.description)
      .finish_non_exhaustive()
  }
}

/// Evaluate `requirements` of `target` in order, stopping at the first failure.
pub fn evaluate(target: &str, requirements: &[Requirement], ctx: &RunContext) -> Result<(), PreconditionError> {
  for requirement in requirements {
    trace!(name = %target, requirement = %requirement.description, "evaluating requirement");
    if !requirement.holds(ctx) {
      debug!(name = %target, requirement = %requirement.description, "requirement not met");
      return Err(PreconditionError {
        target: target.to_string(),
        description: requirement.description.clone(),
      });
    }
  }
  Ok(())
}
