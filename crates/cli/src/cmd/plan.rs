//! Implementation of the `stagehand plan` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use stagehand_lib::artifacts::FsQuery;
use stagehand_lib::execute::command::ShellRunner;
use stagehand_lib::{RunRequest, Scheduler};

use super::Location;
use crate::output::{OutputFormat, print_info, print_json, symbols};

#[derive(Args, Debug)]
pub struct SelectArgs {
  /// Target to plan (default: the manifest's default target)
  pub goal: Option<String>,

  /// Additional targets to schedule alongside the goal
  #[arg(short, long = "target", value_name = "NAME")]
  pub targets: Vec<String>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
  goal: &'a str,
  schedule: Vec<PlannedTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct PlannedTarget<'a> {
  name: &'a str,
  /// Targets that would be appended if this one succeeds.
  triggers: Vec<&'a str>,
}

/// Print the initial schedule for a goal without running anything.
///
/// Triggered targets are listed with the target whose success would schedule
/// them, since the final schedule depends on outcomes.
pub fn cmd_plan(location: &Location, args: SelectArgs) -> Result<()> {
  let pipeline = location.load()?;
  let goal = match args.goal {
    Some(goal) => goal,
    None => pipeline
      .manifest
      .default_goal()
      .context("The pipeline declares no targets")?
      .to_string(),
  };

  let scheduler = Scheduler::new(
    &pipeline.graph,
    Arc::new(ShellRunner::new()),
    Arc::new(FsQuery::new(&pipeline.root)),
  );
  let request = RunRequest::new(&goal).with_targets(args.targets);
  let order = scheduler
    .plan(&request)
    .with_context(|| format!("Cannot plan '{}'", goal))?;

  let schedule: Vec<PlannedTarget> = order
    .iter()
    .map(|name| PlannedTarget {
      name,
      triggers: pipeline.graph.triggered_from(name).into_iter().map(|t| t.name()).collect(),
    })
    .collect();

  if args.output.is_json() {
    return print_json(&PlanOutput { goal: &goal, schedule });
  }

  print_info(&format!("Plan for '{}' ({} target(s))", goal, schedule.len()));
  for (position, planned) in schedule.iter().enumerate() {
    println!("  {:>2}. {}", position + 1, planned.name);
    for triggered in &planned.triggers {
      println!("        {} {} (on success)", symbols::ARROW, triggered);
    }
  }

  Ok(())
}
