//! Conventional artifact directories.
//!
//! Bodies read and write below a single root. Contract globs are relative to
//! that root, and partitioned bodies keep their outputs apart by writing into
//! [`ArtifactLayout::partition_dir`].

use std::path::{Path, PathBuf};

use crate::consts::MANIFEST_FILENAME;
use crate::partition::PartitionSelection;

pub const OUTPUT_DIR: &str = "Output";
pub const PACKAGES_DIR: &str = "packages";
pub const COVERAGE_DIR: &str = "Coverage";
pub const COVERAGE_REPORT_DIR: &str = "CoverageReport";
pub const SOURCE_DIR: &str = "Source";
pub const TESTS_DIR: &str = "Tests";

/// Named directories under the artifact root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
  root: PathBuf,
}

impl ArtifactLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// `{root}/Output`
  pub fn output_dir(&self) -> PathBuf {
    self.root.join(OUTPUT_DIR)
  }

  /// `{root}/Output/packages`
  pub fn packages_dir(&self) -> PathBuf {
    self.output_dir().join(PACKAGES_DIR)
  }

  /// `{root}/Coverage`
  pub fn coverage_dir(&self) -> PathBuf {
    self.root.join(COVERAGE_DIR)
  }

  /// `{root}/CoverageReport`
  pub fn coverage_report_dir(&self) -> PathBuf {
    self.root.join(COVERAGE_REPORT_DIR)
  }

  pub fn source_dir(&self) -> PathBuf {
    self.root.join(SOURCE_DIR)
  }

  pub fn tests_dir(&self) -> PathBuf {
    self.root.join(TESTS_DIR)
  }

  /// Look a directory up by the name used in `$${dir:NAME}` placeholders.
  pub fn dir(&self, name: &str) -> Option<PathBuf> {
    match name {
      "root" => Some(self.root.clone()),
      "output" => Some(self.output_dir()),
      "packages" => Some(self.packages_dir()),
      "coverage" => Some(self.coverage_dir()),
      "coverage_report" => Some(self.coverage_report_dir()),
      "source" => Some(self.source_dir()),
      "tests" => Some(self.tests_dir()),
      _ => None,
    }
  }

  /// A partition-scoped subdirectory of `base`, e.g. `Coverage/partition-1-of-2`.
  ///
  /// Concurrent partition processes never share these directories.
  pub fn partition_dir(&self, base: &Path, selection: PartitionSelection) -> PathBuf {
    base.join(format!("partition-{}-of-{}", selection.index + 1, selection.count))
  }
}

/// Walk up from `start` to the first directory holding a pipeline manifest.
pub fn discover_root(start: &Path) -> Option<PathBuf> {
  let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
  start
    .ancestors()
    .find(|dir| dir.join(MANIFEST_FILENAME).is_file())
    .map(Path::to_path_buf)
}
