//! Implementation of the `stagehand ci` command.
//!
//! Renders the CI trigger descriptors of the pipeline so workflow generators
//! can consume them, optionally filtered to the triggers a given push or pull
//! request would start.

use anyhow::{Result, bail};
use clap::Args;

use stagehand_lib::ci::CiDescriptor;

use super::Location;
use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

#[derive(Args, Debug)]
pub struct CiArgs {
  /// Only render the named trigger
  pub name: Option<String>,

  /// Only triggers that run on a push to this branch
  #[arg(long, value_name = "BRANCH")]
  pub push: Option<String>,

  /// Only triggers that run on a pull request into this branch
  #[arg(long, value_name = "BRANCH", conflicts_with = "push")]
  pub pull_request: Option<String>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

pub fn cmd_ci(location: &Location, args: CiArgs) -> Result<()> {
  let pipeline = location.load()?;

  if let Some(name) = &args.name
    && !pipeline.manifest.ci.iter().any(|t| &t.name == name)
  {
    bail!("No CI trigger named '{}'", name);
  }

  let mut descriptors: Vec<CiDescriptor> = Vec::new();
  for trigger in &pipeline.manifest.ci {
    if args.name.as_ref().is_some_and(|name| name != &trigger.name) {
      continue;
    }
    if let Some(branch) = &args.push
      && !trigger.matches_push(branch)
    {
      continue;
    }
    if let Some(branch) = &args.pull_request
      && !trigger.matches_pull_request(branch)
    {
      continue;
    }
    descriptors.push(trigger.descriptor(&pipeline.graph)?);
  }

  if args.output.is_json() {
    return print_json(&descriptors);
  }

  if descriptors.is_empty() {
    print_info("No matching CI triggers");
    return Ok(());
  }

  for descriptor in &descriptors {
    print_info(&descriptor.name);
    print_stat("Invokes", &descriptor.invoked_targets.join(", "));
    if !descriptor.push_branches.is_empty() {
      print_stat("Push", &descriptor.push_branches.join(", "));
    }
    if !descriptor.push_branches_ignore.is_empty() {
      print_stat("Push (ignored)", &descriptor.push_branches_ignore.join(", "));
    }
    if !descriptor.pull_request_branches.is_empty() {
      print_stat("Pull request", &descriptor.pull_request_branches.join(", "));
    }
    print_stat("Jobs", &descriptor.matrix.len().to_string());
    for job in &descriptor.matrix {
      let image = job.image.as_deref().unwrap_or("default");
      match job.partition {
        Some(partition) => println!("    {} {} partition {}", symbols::ARROW, image, partition),
        None => println!("    {} {}", symbols::ARROW, image),
      }
    }
    println!();
  }

  Ok(())
}
