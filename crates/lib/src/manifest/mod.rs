//! Pipeline manifests.
//!
//! A manifest is the JSON form of a pipeline. Loading parses it, checks every
//! command template, resolves work globs against the root and registers the
//! targets in declaration order.

mod types;

pub use types::*;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::artifacts::FileQuery;
use crate::ci::CiError;
use crate::config::ConfigError;
use crate::execute::actions::{CommandStep, steps_body};
use crate::graph::{GraphError, TargetGraph};
use crate::partition::PartitionError;
use crate::placeholder::PlaceholderError;
use crate::target::{Consume, Target};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("target '{target}': invalid command '{cmd}': {source}")]
  Placeholder {
    target: String,
    cmd: String,
    #[source]
    source: PlaceholderError,
  },

  #[error("target '{target}': {source}")]
  Partition {
    target: String,
    #[source]
    source: PartitionError,
  },

  #[error("target '{target}': {source}")]
  Requirement {
    target: String,
    #[source]
    source: ConfigError,
  },

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Ci(#[from] CiError),
}

impl PipelineManifest {
  /// Read and parse a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let manifest = Self::parse(&content)?;
    info!(path = %path.display(), targets = manifest.targets.len(), "loaded manifest");
    Ok(manifest)
  }

  pub fn parse(content: &str) -> Result<Self, ManifestError> {
    Ok(serde_json::from_str(content)?)
  }

  /// The goal to run when none is given: `default_target`, else the last
  /// declared target.
  pub fn default_goal(&self) -> Option<&str> {
    self
      .default_target
      .as_deref()
      .or_else(|| self.targets.last().map(|t| t.name.as_str()))
  }

  /// Whether any precondition needs branch or working-copy facts.
  pub fn uses_repository_state(&self) -> bool {
    self
      .targets
      .iter()
      .flat_map(|t| t.requires.iter())
      .any(RequirementDecl::needs_repository)
  }

  /// Build and validate the target graph, resolving `work_glob` through `query`.
  pub fn into_graph(&self, query: &dyn FileQuery) -> Result<TargetGraph, ManifestError> {
    let names: BTreeSet<&str> = self.targets.iter().map(|t| t.name.as_str()).collect();
    let mut graph = TargetGraph::new();
    for decl in &self.targets {
      graph.register(build_target(decl, &names, query)?)?;
    }
    graph.validate()?;

    if let Some(goal) = &self.default_target
      && !graph.contains(goal)
    {
      return Err(GraphError::TargetNotFound(goal.clone()).into());
    }
    for trigger in &self.ci {
      trigger.validate(&graph)?;
    }

    debug!(targets = graph.len(), triggers = self.ci.len(), "built target graph");
    Ok(graph)
  }
}

fn build_target(decl: &TargetDecl, names: &BTreeSet<&str>, query: &dyn FileQuery) -> Result<Target, ManifestError> {
  let mut builder = Target::builder(&decl.name)
    .depends_on(&decl.depends_on)
    .triggered_by(&decl.triggered_by)
    .after(&decl.after)
    .work(&decl.work)
    .proceed_after_failure(decl.proceed_after_failure)
    .tolerates_failed_dependencies(decl.tolerates_failed_dependencies);

  if let Some(description) = &decl.description {
    builder = builder.description(description);
  }
  if let Some(count) = decl.partitions {
    if count == 0 {
      return Err(ManifestError::Partition {
        target: decl.name.clone(),
        source: PartitionError::InvalidCount,
      });
    }
    builder = builder.partitions(count);
  }
  if let Some(glob) = &decl.work_glob {
    let items = query.matches(glob);
    debug!(name = %decl.name, glob = %glob, items = items.len(), "resolved work glob");
    builder = builder.work(items);
  }
  for glob in &decl.produces {
    builder = builder.produces(glob);
  }
  for consume in &decl.consumes {
    builder = builder.consume(Consume::from(consume));
  }
  for requirement in &decl.requires {
    let requirement = requirement.to_requirement().map_err(|source| ManifestError::Requirement {
      target: decl.name.clone(),
      source,
    })?;
    builder = builder.requires(requirement);
  }

  let mut steps = Vec::with_capacity(decl.commands.len());
  for command in &decl.commands {
    let spec = command.to_spec();
    let invalid = |source: PlaceholderError| ManifestError::Placeholder {
      target: decl.name.clone(),
      cmd: spec.cmd.clone(),
      source,
    };
    let step = CommandStep::parse(&spec).map_err(invalid)?;
    if let Some(unknown) = step.scheduled_targets().find(|t| !names.contains(t)) {
      return Err(invalid(PlaceholderError::UnknownTarget(unknown.to_string())));
    }
    steps.push(step);
  }
  if !steps.is_empty() {
    builder = builder.body(steps_body(steps));
  }

  Ok(builder.build())
}
