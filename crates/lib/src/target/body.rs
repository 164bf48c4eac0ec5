//! Target bodies and the context they run with.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::context::RunContext;
use crate::execute::command::{CommandError, CommandRunner};
use crate::partition::PartitionSelection;
use crate::placeholder::PlaceholderError;

/// An owned, boxed future that can cross threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The side-effecting procedure of a target.
pub type BodyFn = Arc<dyn Fn(BodyContext) -> BoxFuture<'static, Result<(), BodyError>> + Send + Sync>;

/// Failure raised by a body.
#[derive(Debug, Error)]
pub enum BodyError {
  #[error(transparent)]
  Command(#[from] CommandError),

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error("{0}")]
  Message(String),
}

impl BodyError {
  pub fn msg(message: impl Into<String>) -> Self {
    BodyError::Message(message.into())
  }
}

/// Everything a body invocation gets to see.
#[derive(Clone)]
pub struct BodyContext {
  /// Name of the running target.
  pub target: String,

  /// The work items of the selected partition, or the whole collection.
  pub items: Vec<String>,

  /// The partition that was selected, for partitioned targets.
  pub partition: Option<PartitionSelection>,

  pub run: Arc<RunContext>,

  /// Capability used to invoke external tools.
  pub runner: Arc<dyn CommandRunner>,

  scheduled: Arc<BTreeSet<String>>,
}

impl BodyContext {
  pub fn new(
    target: impl Into<String>,
    items: Vec<String>,
    partition: Option<PartitionSelection>,
    run: Arc<RunContext>,
    runner: Arc<dyn CommandRunner>,
    scheduled: Arc<BTreeSet<String>>,
  ) -> Self {
    Self {
      target: target.into(),
      items,
      partition,
      run,
      runner,
      scheduled,
    }
  }

  /// Whether `target` is part of this run's schedule.
  ///
  /// Bodies use this to pass flags such as `--no-restore` when the producing
  /// target already ran earlier in the same invocation.
  pub fn is_scheduled(&self, target: &str) -> bool {
    self.scheduled.contains(target)
  }
}

impl std::fmt::Debug for BodyContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BodyContext")
      .field("target", &self.target)
      .field("items", &self.items)
      .field("partition", &self.partition)
      .field("scheduled", &self.scheduled)
      .finish_non_exhaustive()
  }
}
