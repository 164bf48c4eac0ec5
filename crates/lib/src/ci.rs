//! CI trigger descriptors.
//!
//! A descriptor says when a CI workflow runs (push and pull-request branch
//! patterns) and which targets it invokes. The workflow file itself is written
//! by other tooling; this module validates the descriptor against the graph and
//! renders the data that tooling needs, including one matrix entry per
//! partition of every partitioned invoked target.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::graph::{GraphError, TargetGraph};
use crate::partition::PartitionSelection;
use crate::util::glob;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CiError {
  #[error("CI trigger '{trigger}' invokes unknown target '{target}'")]
  UnknownInvokedTarget { trigger: String, target: String },

  #[error("CI trigger '{0}' invokes no targets")]
  NothingInvoked(String),

  #[error(transparent)]
  Graph(#[from] GraphError),
}

/// When a CI workflow runs and what it invokes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CiTrigger {
  pub name: String,

  /// Runner images the workflow fans out over.
  #[serde(default)]
  pub images: Vec<String>,

  /// Branches whose pushes run the workflow. Empty means every branch.
  #[serde(default)]
  pub push_branches: Vec<String>,

  #[serde(default)]
  pub push_branches_ignore: Vec<String>,

  #[serde(default)]
  pub pull_request_branches: Vec<String>,

  #[serde(default)]
  pub publish_artifacts: bool,

  pub invoked_targets: Vec<String>,
}

/// One job of the rendered workflow matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
  pub image: Option<String>,
  pub targets: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub partition: Option<PartitionSelection>,
}

/// Everything a workflow generator needs for one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiDescriptor {
  pub name: String,
  pub push_branches: Vec<String>,
  pub push_branches_ignore: Vec<String>,
  pub pull_request_branches: Vec<String>,
  pub publish_artifacts: bool,
  pub invoked_targets: Vec<String>,
  /// Every target of the graph, in registration order.
  pub targets: Vec<String>,
  pub matrix: Vec<MatrixEntry>,
}

impl CiTrigger {
  /// Check that the trigger invokes at least one target and that every
  /// invoked target exists.
  pub fn validate(&self, graph: &TargetGraph) -> Result<(), CiError> {
    if self.invoked_targets.is_empty() {
      return Err(CiError::NothingInvoked(self.name.clone()));
    }
    for target in &self.invoked_targets {
      if !graph.contains(target) {
        return Err(CiError::UnknownInvokedTarget {
          trigger: self.name.clone(),
          target: target.clone(),
        });
      }
    }
    Ok(())
  }

  /// Whether a push to `branch` runs this workflow.
  pub fn matches_push(&self, branch: &str) -> bool {
    let included = self.push_branches.is_empty() || self.push_branches.iter().any(|p| glob::matches(p, branch));
    let ignored = self.push_branches_ignore.iter().any(|p| glob::matches(p, branch));
    trace!(trigger = %self.name, branch, included, ignored, "matching push");
    included && !ignored
  }

  /// Whether a pull request into `branch` runs this workflow.
  pub fn matches_pull_request(&self, branch: &str) -> bool {
    self.pull_request_branches.iter().any(|p| glob::matches(p, branch))
  }

  /// Render the descriptor, expanding partitioned invoked targets into one
  /// matrix job per partition and image.
  pub fn descriptor(&self, graph: &TargetGraph) -> Result<CiDescriptor, CiError> {
    self.validate(graph)?;

    let closure = graph.closure_for_all(self.invoked_targets.iter().map(String::as_str))?;
    let partitions = graph
      .order_for(&closure)?
      .iter()
      .filter_map(|name| graph.get(name).and_then(|t| t.partitions()))
      .max();

    let selections: Vec<Option<PartitionSelection>> = match partitions {
      Some(count) if count > 0 => (0..count).map(|index| Some(PartitionSelection { index, count })).collect(),
      _ => vec![None],
    };
    let images: Vec<Option<String>> = if self.images.is_empty() {
      vec![None]
    } else {
      self.images.iter().cloned().map(Some).collect()
    };

    let mut matrix = Vec::new();
    for image in &images {
      for partition in &selections {
        matrix.push(MatrixEntry {
          image: image.clone(),
          targets: self.invoked_targets.clone(),
          partition: *partition,
        });
      }
    }

    Ok(CiDescriptor {
      name: self.name.clone(),
      push_branches: self.push_branches.clone(),
      push_branches_ignore: self.push_branches_ignore.clone(),
      pull_request_branches: self.pull_request_branches.clone(),
      publish_artifacts: self.publish_artifacts,
      invoked_targets: self.invoked_targets.clone(),
      targets: graph.names(),
      matrix,
    })
  }
}
