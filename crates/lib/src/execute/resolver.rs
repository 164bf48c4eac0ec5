//! Placeholder resolver for commands run by a target body.
//!
//! Resolves run parameters, artifact directories (optionally scoped to the
//! active partition) and the current work item against the [`BodyContext`] of the invocation.

use crate::placeholder::{PlaceholderError, Resolver};
use crate::target::BodyContext;

/// Resolves placeholders for one body invocation, optionally for one work item.
pub struct BodyResolver<'a> {
  ctx: &'a BodyContext,
  item: Option<&'a str>,
}

impl<'a> BodyResolver<'a> {
  pub fn new(ctx: &'a BodyContext) -> Self {
    Self { ctx, item: None }
  }

  /// A resolver that expands `$${item}` to `item`.
  pub fn for_item(ctx: &'a BodyContext, item: &'a str) -> Self {
    Self { ctx, item: Some(item) }
  }
}

impl Resolver for BodyResolver<'_> {
  fn resolve_param(&self, name: &str) -> Result<String, PlaceholderError> {
    let config = self.ctx.run.config();
    match name {
      "configuration" => Ok(config.configuration.to_string()),
      "target" => Ok(self.ctx.target.clone()),
      "partition" => self
        .ctx
        .partition
        .map(|p| p.to_string())
        .ok_or_else(|| PlaceholderError::UnresolvedParam(name.to_string())),
      "api_key" => config
        .api_key
        .clone()
        .ok_or_else(|| PlaceholderError::UnresolvedParam(name.to_string())),
      "ignore_failed_sources" => Ok(config.ignore_failed_sources.to_string()),
      _ => Err(PlaceholderError::UnresolvedParam(name.to_string())),
    }
  }

  fn resolve_item(&self) -> Option<&str> {
    self.item
  }

  fn resolve_dir(&self, name: &str) -> Result<String, PlaceholderError> {
    self
      .ctx
      .run
      .layout()
      .dir(name)
      .map(|p| p.to_string_lossy().to_string())
      .ok_or_else(|| PlaceholderError::UnknownDir(name.to_string()))
  }

  /// Without an active partition the body owns the whole collection, so the
  /// plain directory is used.
  fn resolve_partition_dir(&self, name: &str) -> Result<String, PlaceholderError> {
    let layout = self.ctx.run.layout();
    let base = layout
      .dir(name)
      .ok_or_else(|| PlaceholderError::UnknownDir(name.to_string()))?;
    let dir = match self.ctx.partition {
      Some(selection) => layout.partition_dir(&base, selection),
      None => base,
    };
    Ok(dir.to_string_lossy().to_string())
  }

  fn resolve_scheduled(&self, target: &str) -> bool {
    self.ctx.is_scheduled(target)
  }
}
