//! Implementation of the `stagehand list` command.

use anyhow::Result;
use serde::Serialize;

use stagehand_lib::Target;

use super::Location;
use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Debug, Serialize)]
struct TargetSummary<'a> {
  name: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  description: Option<&'a str>,
  depends_on: &'a [String],
  triggered_by: &'a [String],
  #[serde(skip_serializing_if = "Option::is_none")]
  partitions: Option<usize>,
  work_items: usize,
  is_default: bool,
}

impl<'a> TargetSummary<'a> {
  fn new(target: &'a Target, default: Option<&str>) -> Self {
    Self {
      name: target.name(),
      description: target.description(),
      depends_on: target.depends_on(),
      triggered_by: target.triggered_by(),
      partitions: target.partitions(),
      work_items: target.work().len(),
      is_default: default == Some(target.name()),
    }
  }
}

pub fn cmd_list(location: &Location, output: OutputFormat) -> Result<()> {
  let pipeline = location.load()?;
  let default = pipeline.manifest.default_goal();
  let targets: Vec<TargetSummary> = pipeline.graph.iter().map(|t| TargetSummary::new(t, default)).collect();

  if output.is_json() {
    return print_json(&targets);
  }

  if targets.is_empty() {
    print_info("No targets declared");
    return Ok(());
  }

  let width = targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
  for target in &targets {
    let marker = if target.is_default { " (default)" } else { "" };
    let description = target.description.unwrap_or_default();
    println!("  {:<width$}  {}{}", target.name, description, marker, width = width);
  }

  println!();
  print_stat("Targets", &targets.len().to_string());
  Ok(())
}
