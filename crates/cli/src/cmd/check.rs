//! Implementation of the `stagehand check` command.
//!
//! Loading already rejects cycles, duplicates, dangling references and bad
//! command templates. This adds the artifact contract pass, whose findings are
//! warnings only.

use anyhow::Result;
use serde::Serialize;

use stagehand_lib::artifacts::{ArtifactTracker, ContractMismatchWarning, FsQuery};

use super::Location;
use crate::output::{OutputFormat, print_json, print_stat, print_success, print_warning};

#[derive(Debug, Serialize)]
struct CheckOutput {
  targets: usize,
  ci_triggers: usize,
  warnings: Vec<ContractMismatchWarning>,
}

pub fn cmd_check(location: &Location, inspect_files: bool, output: OutputFormat) -> Result<()> {
  let pipeline = location.load()?;
  let query = FsQuery::new(&pipeline.root);
  let warnings = ArtifactTracker::new(&pipeline.graph, &query).check_contracts(inspect_files);

  if output.is_json() {
    return print_json(&CheckOutput {
      targets: pipeline.graph.len(),
      ci_triggers: pipeline.manifest.ci.len(),
      warnings,
    });
  }

  for warning in &warnings {
    print_warning(&warning.to_string());
  }
  if warnings.is_empty() {
    print_success("Pipeline is valid");
  } else {
    print_success(&format!("Pipeline is valid with {} warning(s)", warnings.len()));
  }
  print_stat("Targets", &pipeline.graph.len().to_string());
  print_stat("CI triggers", &pipeline.manifest.ci.len().to_string());

  Ok(())
}
