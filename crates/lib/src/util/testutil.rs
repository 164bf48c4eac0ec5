//! Test utilities for stagehand-lib.
//!
//! Fakes for the injected capabilities plus helpers that build bodies which
//! record their invocations.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::artifacts::FileQuery;
use crate::execute::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::target::{BodyContext, BodyError, BoxFuture, TargetBuilder};
use crate::util::glob::Pattern;

/// A [`CommandRunner`] that records every spec and never spawns anything.
#[derive(Debug, Default)]
pub struct FakeRunner {
  calls: Mutex<Vec<CommandSpec>>,
  failing: Vec<String>,
  outputs: HashMap<String, String>,
}

impl FakeRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Commands containing `needle` exit with code 1.
  pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
    self.failing.push(needle.into());
    self
  }

  /// Commands equal to `cmd` print `stdout`.
  pub fn with_output(mut self, cmd: impl Into<String>, stdout: impl Into<String>) -> Self {
    self.outputs.insert(cmd.into(), stdout.into());
    self
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.lock().unwrap().clone()
  }

  pub fn commands(&self) -> Vec<String> {
    self.calls().into_iter().map(|c| c.cmd).collect()
  }
}

impl CommandRunner for FakeRunner {
  fn execute<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<CommandOutput, CommandError>> {
    Box::pin(async move {
      self.calls.lock().unwrap().push(spec.clone());
      if self.failing.iter().any(|n| spec.cmd.contains(n.as_str())) {
        return Err(CommandError::Failed {
          cmd: spec.cmd.clone(),
          code: Some(1),
        });
      }
      Ok(CommandOutput {
        stdout: self.outputs.get(&spec.cmd).cloned().unwrap_or_default(),
        code: Some(0),
      })
    })
  }
}

/// A [`FileQuery`] over a fixed set of relative paths.
#[derive(Debug, Default, Clone)]
pub struct FakeQuery {
  paths: BTreeSet<String>,
}

impl FakeQuery {
  pub fn new<I, S>(paths: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      paths: paths.into_iter().map(Into::into).collect(),
    }
  }
}

impl FileQuery for FakeQuery {
  fn matches(&self, pattern: &str) -> Vec<String> {
    let pattern = Pattern::new(pattern);
    self.paths.iter().filter(|p| pattern.matches(p)).cloned().collect()
  }
}

/// One recorded body invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub target: String,
  pub items: Vec<String>,
}

/// Shared log of body invocations, in call order.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
  invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl Recorder {
  pub fn new() -> Self {
    Self::default()
  }

  fn record(&self, ctx: &BodyContext) {
    self.invocations.lock().unwrap().push(Invocation {
      target: ctx.target.clone(),
      items: ctx.items.clone(),
    });
  }

  /// Names of the targets whose body ran, in order.
  pub fn targets(&self) -> Vec<String> {
    self.invocations.lock().unwrap().iter().map(|i| i.target.clone()).collect()
  }

  pub fn invocations(&self) -> Vec<Invocation> {
    self.invocations.lock().unwrap().clone()
  }

  /// Attach a body that records and succeeds.
  pub fn succeeds(&self, builder: TargetBuilder) -> TargetBuilder {
    let recorder = self.clone();
    builder.executes(move |ctx| {
      recorder.record(&ctx);
      async { Ok(()) }
    })
  }

  /// Attach a body that records and fails with `message`.
  pub fn fails(&self, builder: TargetBuilder, message: &str) -> TargetBuilder {
    let recorder = self.clone();
    let message = message.to_string();
    builder.executes(move |ctx| {
      recorder.record(&ctx);
      let message = message.clone();
      async move { Err(BodyError::msg(message)) }
    })
  }
}
