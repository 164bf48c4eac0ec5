//! The read-only context shared by every target of a run.

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, RunConfig};
use crate::layout::ArtifactLayout;

/// Repository facts gathered once before the run, for preconditions.
///
/// `None` means the fact could not be determined; predicates over unknown
/// facts fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
  pub branch: Option<String>,
  pub clean: Option<bool>,
}

/// Created at run start, read-only afterwards, dropped when the run ends.
#[derive(Debug, Clone)]
pub struct RunContext {
  config: RunConfig,
  layout: ArtifactLayout,
  repository: RepositoryState,
}

impl RunContext {
  pub fn new(config: RunConfig, repository: RepositoryState) -> Self {
    let layout = ArtifactLayout::new(config.root.clone());
    Self {
      config,
      layout,
      repository,
    }
  }

  pub fn config(&self) -> &RunConfig {
    &self.config
  }

  pub fn configuration(&self) -> Configuration {
    self.config.configuration
  }

  pub fn layout(&self) -> &ArtifactLayout {
    &self.layout
  }

  pub fn repository(&self) -> &RepositoryState {
    &self.repository
  }
}

impl Default for RunContext {
  fn default() -> Self {
    Self::new(RunConfig::default(), RepositoryState::default())
  }
}
