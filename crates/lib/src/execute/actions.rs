//! Command steps: the body of a manifest-declared target.
//!
//! A step is a command template. Placeholders are parsed once when the step is
//! built and expanded for every invocation. A step that references `$${item}`
//! runs once per work item handed to the body, otherwise it runs once.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::execute::command::CommandSpec;
use crate::execute::resolver::BodyResolver;
use crate::placeholder::{self, PlaceholderError, Segment};
use crate::target::{BodyContext, BodyError, BodyFn, BoxFuture};

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
  cmd: Vec<Segment>,
  env: BTreeMap<String, Vec<Segment>>,
  cwd: Option<Vec<Segment>>,
  per_item: bool,
}

impl CommandStep {
  /// Parse every placeholder in `spec`; fails on the first malformed one.
  pub fn parse(spec: &CommandSpec) -> Result<Self, PlaceholderError> {
    let cmd = placeholder::parse(&spec.cmd)?;

    let mut env = BTreeMap::new();
    for (key, value) in &spec.env {
      env.insert(key.clone(), placeholder::parse(value)?);
    }

    let cwd = spec
      .cwd
      .as_ref()
      .map(|cwd| placeholder::parse(&cwd.to_string_lossy()))
      .transpose()?;

    let per_item = placeholder::references_item(&cmd)
      || env.values().any(|v| placeholder::references_item(v))
      || cwd.as_deref().is_some_and(placeholder::references_item);

    Ok(Self { cmd, env, cwd, per_item })
  }

  /// Targets named by `$${scheduled:TARGET}` anywhere in the template.
  pub fn scheduled_targets(&self) -> impl Iterator<Item = &str> {
    placeholder::scheduled_targets(&self.cmd)
      .chain(self.env.values().flat_map(|v| placeholder::scheduled_targets(v)))
      .chain(self.cwd.iter().flat_map(|c| placeholder::scheduled_targets(c)))
  }

  /// Whether the step runs once per work item.
  pub fn per_item(&self) -> bool {
    self.per_item
  }

  /// Expand the template for one invocation.
  ///
  /// Relative working directories are resolved against the artifact root.
  pub fn expand(&self, resolver: &BodyResolver<'_>, ctx: &BodyContext) -> Result<CommandSpec, PlaceholderError> {
    let mut env = BTreeMap::new();
    for (key, value) in &self.env {
      env.insert(key.clone(), placeholder::substitute_segments(value, resolver)?);
    }

    let cwd = match &self.cwd {
      Some(cwd) => {
        let cwd = PathBuf::from(placeholder::substitute_segments(cwd, resolver)?);
        Some(ctx.run.layout().root().join(cwd))
      }
      None => Some(ctx.run.layout().root().to_path_buf()),
    };

    Ok(CommandSpec {
      cmd: placeholder::substitute_segments(&self.cmd, resolver)?,
      env,
      cwd,
    })
  }
}

/// Run `steps` in order, stopping at the first failure.
pub async fn run_steps(steps: &[CommandStep], ctx: &BodyContext) -> Result<(), BodyError> {
  for step in steps {
    if step.per_item() {
      if ctx.items.is_empty() {
        debug!(name = %ctx.target, "no work items, skipping per-item command");
      }
      for item in &ctx.items {
        let spec = step.expand(&BodyResolver::for_item(ctx, item), ctx)?;
        ctx.runner.execute(&spec).await?;
      }
    } else {
      let spec = step.expand(&BodyResolver::new(ctx), ctx)?;
      ctx.runner.execute(&spec).await?;
    }
  }
  Ok(())
}

/// A body that runs `steps` through the context's command runner.
pub fn steps_body(steps: Vec<CommandStep>) -> BodyFn {
  let steps = Arc::new(steps);
  Arc::new(move |ctx: BodyContext| -> BoxFuture<'static, Result<(), BodyError>> {
    let steps = steps.clone();
    Box::pin(async move { run_steps(&steps, &ctx).await })
  })
}
