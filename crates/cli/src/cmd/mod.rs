mod check;
mod ci;
mod list;
mod plan;
mod run;

pub use check::cmd_check;
pub use ci::{CiArgs, cmd_ci};
pub use list::cmd_list;
pub use plan::{SelectArgs, cmd_plan};
pub use run::{RunArgs, cmd_run};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use stagehand_lib::PipelineManifest;
use stagehand_lib::TargetGraph;
use stagehand_lib::artifacts::FsQuery;
use stagehand_lib::consts::MANIFEST_FILENAME;
use stagehand_lib::layout::discover_root;

/// Where the pipeline lives, as given on the command line.
pub struct Location {
  pub root: Option<PathBuf>,
  pub manifest: Option<PathBuf>,
}

/// A loaded manifest together with its validated graph.
pub struct Pipeline {
  pub root: PathBuf,
  pub manifest: PipelineManifest,
  pub graph: TargetGraph,
}

impl Location {
  /// Resolve the root directory.
  ///
  /// An explicit `--root` wins, then the directory of `--manifest`, then the
  /// nearest ancestor of the working directory holding a manifest.
  fn resolve_root(&self) -> Result<PathBuf> {
    if let Some(root) = &self.root {
      return Ok(absolute(root));
    }
    if let Some(manifest) = &self.manifest
      && let Some(parent) = absolute(manifest).parent()
    {
      return Ok(parent.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    match discover_root(&cwd) {
      Some(root) => Ok(root),
      None => bail!(
        "No {} found in {} or any parent directory",
        MANIFEST_FILENAME,
        cwd.display()
      ),
    }
  }

  /// Load the manifest and build its graph, resolving work globs on disk.
  pub fn load(&self) -> Result<Pipeline> {
    let root = self.resolve_root()?;
    let manifest_path = match &self.manifest {
      Some(path) => absolute(path),
      None => root.join(MANIFEST_FILENAME),
    };
    debug!(root = %root.display(), manifest = %manifest_path.display(), "locating pipeline");

    let manifest = PipelineManifest::load(&manifest_path)
      .with_context(|| format!("Failed to load {}", manifest_path.display()))?;
    let graph = manifest
      .into_graph(&FsQuery::new(&root))
      .with_context(|| format!("Invalid pipeline in {}", manifest_path.display()))?;

    Ok(Pipeline { root, manifest, graph })
  }
}

fn absolute(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
