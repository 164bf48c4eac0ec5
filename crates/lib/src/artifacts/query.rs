use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::WalkDir;

use crate::util::glob::Pattern;

/// Filesystem lookups used by artifact checks.
pub trait FileQuery: Send + Sync {
  /// Relative paths under the root that match `pattern`, sorted.
  fn matches(&self, pattern: &str) -> Vec<String>;

  /// Whether at least one existing path matches `pattern`.
  fn any_match(&self, pattern: &str) -> bool {
    !self.matches(pattern).is_empty()
  }
}

/// [`FileQuery`] over a real directory tree.
#[derive(Debug, Clone)]
pub struct FsQuery {
  root: PathBuf,
}

impl FsQuery {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn walk(&self, pattern: &Pattern, stop_at_first: bool) -> Vec<String> {
    let start = self.root.join(pattern.literal_prefix());

    if pattern.is_literal() {
      return if start.exists() {
        vec![pattern.normalized()]
      } else {
        Vec::new()
      };
    }

    if !start.is_dir() {
      return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(&start).min_depth(1).follow_links(true).into_iter().filter_map(Result::ok) {
      let Ok(relative) = entry.path().strip_prefix(&self.root) else {
        continue;
      };
      let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

      if pattern.matches(&relative) {
        found.push(relative);
        if stop_at_first {
          break;
        }
      }
    }

    found.sort();
    trace!(pattern = %pattern, root = ?self.root, matches = found.len(), "resolved glob");
    found
  }
}

impl FileQuery for FsQuery {
  fn matches(&self, pattern: &str) -> Vec<String> {
    self.walk(&Pattern::new(pattern), false)
  }

  fn any_match(&self, pattern: &str) -> bool {
    !self.walk(&Pattern::new(pattern), true).is_empty()
  }
}
