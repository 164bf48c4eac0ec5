use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::body::{BodyContext, BodyError, BodyFn, BoxFuture};
use crate::requires::Requirement;

/// A consumed upstream output: the producing target, optionally narrowed to
/// one glob. Without a glob, all of the producer's `produces` globs apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Consume {
  pub target: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub glob: Option<String>,
}

/// A named unit of orchestrated work.
///
/// Targets are immutable once built; use [`Target::builder`].
#[derive(Clone)]
pub struct Target {
  name: String,
  description: Option<String>,
  depends_on: Vec<String>,
  triggered_by: Vec<String>,
  after: Vec<String>,
  requires: Vec<Requirement>,
  partitions: Option<usize>,
  work: Vec<String>,
  produces: Vec<String>,
  consumes: Vec<Consume>,
  proceed_after_failure: bool,
  tolerates_failed_dependencies: bool,
  body: Option<BodyFn>,
}

impl Target {
  pub fn builder(name: impl Into<String>) -> TargetBuilder {
    TargetBuilder::new(name)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  /// Targets that must finish before this one runs.
  pub fn depends_on(&self) -> &[String] {
    &self.depends_on
  }

  /// Targets whose success schedules this one.
  pub fn triggered_by(&self) -> &[String] {
    &self.triggered_by
  }

  /// Targets this one runs after when both are scheduled.
  pub fn after(&self) -> &[String] {
    &self.after
  }

  pub fn requires(&self) -> &[Requirement] {
    &self.requires
  }

  pub fn partitions(&self) -> Option<usize> {
    self.partitions
  }

  pub fn work(&self) -> &[String] {
    &self.work
  }

  pub fn produces(&self) -> &[String] {
    &self.produces
  }

  pub fn consumes(&self) -> &[Consume] {
    &self.consumes
  }

  pub fn proceed_after_failure(&self) -> bool {
    self.proceed_after_failure
  }

  pub fn tolerates_failed_dependencies(&self) -> bool {
    self.tolerates_failed_dependencies
  }

  pub fn body(&self) -> Option<&BodyFn> {
    self.body.as_ref()
  }

  /// Every target name this one refers to, with the relation it is named in.
  pub fn references(&self) -> impl Iterator<Item = (&'static str, &str)> {
    let depends = self.depends_on.iter().map(|n| ("depends_on", n.as_str()));
    let triggers = self.triggered_by.iter().map(|n| ("triggered_by", n.as_str()));
    let after = self.after.iter().map(|n| ("after", n.as_str()));
    let consumes = self.consumes.iter().map(|c| ("consumes", c.target.as_str()));
    depends.chain(triggers).chain(after).chain(consumes)
  }

  /// Names that must precede this target whenever both are scheduled.
  pub fn ordering_predecessors(&self) -> impl Iterator<Item = &str> {
    self
      .depends_on
      .iter()
      .chain(self.after.iter())
      .map(String::as_str)
      .chain(self.consumes.iter().map(|c| c.target.as_str()))
  }
}

impl std::fmt::Debug for Target {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Target")
      .field("name", &self.name)
      .field("depends_on", &self.depends_on)
      .field("triggered_by", &self.triggered_by)
      .field("after", &self.after)
      .field("requires", &self.requires)
      .field("partitions", &self.partitions)
      .field("produces", &self.produces)
      .field("consumes", &self.consumes)
      .field("proceed_after_failure", &self.proceed_after_failure)
      .field("tolerates_failed_dependencies", &self.tolerates_failed_dependencies)
      .field("has_body", &self.body.is_some())
      .finish_non_exhaustive()
  }
}

/// Builder for [`Target`].
#[must_use]
pub struct TargetBuilder {
  target: Target,
}

impl TargetBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      target: Target {
        name: name.into(),
        description: None,
        depends_on: Vec::new(),
        triggered_by: Vec::new(),
        after: Vec::new(),
        requires: Vec::new(),
        partitions: None,
        work: Vec::new(),
        produces: Vec::new(),
        consumes: Vec::new(),
        proceed_after_failure: false,
        tolerates_failed_dependencies: false,
        body: None,
      },
    }
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.target.description = Some(description.into());
    self
  }

  pub fn depends_on<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    extend_unique(&mut self.target.depends_on, names);
    self
  }

  pub fn triggered_by<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    extend_unique(&mut self.target.triggered_by, names);
    self
  }

  pub fn after<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    extend_unique(&mut self.target.after, names);
    self
  }

  /// Append a precondition; requirements are evaluated in the order added.
  pub fn requires(mut self, requirement: Requirement) -> Self {
    self.target.requires.push(requirement);
    self
  }

  pub fn partitions(mut self, count: usize) -> Self {
    self.target.partitions = Some(count);
    self
  }

  pub fn work<I, S>(mut self, items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.target.work.extend(items.into_iter().map(Into::into));
    self
  }

  pub fn produces(mut self, glob: impl Into<String>) -> Self {
    extend_unique(&mut self.target.produces, [glob]);
    self
  }

  /// Consume everything `target` produces.
  pub fn consumes(self, target: impl Into<String>) -> Self {
    self.consume(Consume {
      target: target.into(),
      glob: None,
    })
  }

  /// Consume the outputs of `target` that match `glob`.
  pub fn consumes_glob(self, target: impl Into<String>, glob: impl Into<String>) -> Self {
    self.consume(Consume {
      target: target.into(),
      glob: Some(glob.into()),
    })
  }

  pub fn consume(mut self, consume: Consume) -> Self {
    if !self.target.consumes.contains(&consume) {
      self.target.consumes.push(consume);
    }
    self
  }

  pub fn proceed_after_failure(mut self, proceed: bool) -> Self {
    self.target.proceed_after_failure = proceed;
    self
  }

  pub fn tolerates_failed_dependencies(mut self, tolerate: bool) -> Self {
    self.target.tolerates_failed_dependencies = tolerate;
    self
  }

  /// Set the body from an async closure.
  pub fn executes<F, Fut>(self, body: F) -> Self
  where
    F: Fn(BodyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BodyError>> + Send + 'static,
  {
    let body: BodyFn = Arc::new(move |ctx: BodyContext| -> BoxFuture<'static, Result<(), BodyError>> {
      Box::pin(body(ctx))
    });
    self.body(body)
  }

  pub fn body(mut self, body: BodyFn) -> Self {
    self.target.body = Some(body);
    self
  }

  pub fn build(self) -> Target {
    self.target
  }
}

fn extend_unique<I, S>(into: &mut Vec<String>, names: I)
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  for name in names {
    let name = name.into();
    if !into.contains(&name) {
      into.push(name);
    }
  }
}
