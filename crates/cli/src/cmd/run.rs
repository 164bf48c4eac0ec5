//! Implementation of the `stagehand run` command.
//!
//! Loads the pipeline, builds the run configuration from flags and environment,
//! probes the repository when a precondition needs it, and runs the goal.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use stagehand_lib::artifacts::FsQuery;
use stagehand_lib::config::Configuration;
use stagehand_lib::consts::{ENV_API_KEY, ENV_CONFIGURATION, ENV_IGNORE_FAILED_SOURCES, ENV_PARTITION};
use stagehand_lib::context::RepositoryState;
use stagehand_lib::execute::command::{CommandRunner, CommandSpec, OutputMode, ShellRunner};
use stagehand_lib::partition::PartitionSelection;
use stagehand_lib::{RunConfig, RunContext, RunReport, RunRequest, Scheduler};

use super::Location;
use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_record, print_success, print_warning,
};

#[derive(Args, Debug)]
pub struct RunArgs {
  /// Target to run (default: the manifest's default target)
  pub goal: Option<String>,

  /// Additional targets to schedule alongside the goal
  #[arg(short, long = "target", value_name = "NAME")]
  pub targets: Vec<String>,

  /// Build configuration (Debug or Release; default depends on the host)
  #[arg(short, long, env = ENV_CONFIGURATION)]
  pub configuration: Option<Configuration>,

  /// API key made available to publishing commands
  #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
  pub api_key: Option<String>,

  /// Ignore unreachable package sources during restore
  #[arg(long, env = ENV_IGNORE_FAILED_SOURCES)]
  pub ignore_failed_sources: bool,

  /// Partition to run, as INDEX/COUNT with a zero-based index
  #[arg(short, long, env = ENV_PARTITION, value_name = "INDEX/COUNT")]
  pub partition: Option<PartitionSelection>,

  /// Skip targets whose consumed artifacts already exist
  #[arg(long)]
  pub skip_satisfied: bool,

  /// Start no further targets after this long (e.g. "30m", "1h 15m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Shell used to run commands (default: /bin/sh, powershell on Windows)
  #[arg(long)]
  pub shell: Option<String>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

/// Execute the run command.
///
/// Returns exit code 1 when any scheduled target failed, including failures
/// that were tolerated.
pub fn cmd_run(location: &Location, args: RunArgs) -> Result<ExitCode> {
  let pipeline = location.load()?;
  let goal = match args.goal.clone() {
    Some(goal) => goal,
    None => pipeline
      .manifest
      .default_goal()
      .context("The pipeline declares no targets")?
      .to_string(),
  };

  let mut config = RunConfig::detect(&pipeline.root);
  if let Some(configuration) = args.configuration {
    config.configuration = configuration;
  }
  config.api_key = args.api_key.filter(|key| !key.trim().is_empty());
  config.ignore_failed_sources = args.ignore_failed_sources;
  config.partition = args.partition;
  config.skip_satisfied = args.skip_satisfied;
  config.timeout = args.timeout;
  debug!(config = ?config, "run configuration");

  // Streamed command output would corrupt a JSON report on stdout.
  let mode = if args.output.is_json() {
    OutputMode::Capture
  } else {
    OutputMode::Inherit
  };
  let runner = ShellRunner::new()
    .with_shell(args.shell)
    .with_mode(mode)
    .with_cwd(&pipeline.root);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let repository = if pipeline.manifest.uses_repository_state() {
    rt.block_on(probe_repository(&pipeline.root))
  } else {
    RepositoryState::default()
  };

  let configuration = config.configuration;
  let request = RunRequest::new(&goal).with_targets(args.targets);
  let scheduler = Scheduler::new(
    &pipeline.graph,
    Arc::new(runner),
    Arc::new(FsQuery::new(&pipeline.root)),
  );

  if !args.output.is_json() {
    let partition = config
      .partition
      .map(|p| format!(", partition {}", p))
      .unwrap_or_default();
    print_info(&format!("Running '{}' ({}{})", goal, configuration, partition));
  }

  let started = SystemTime::now();
  let report = rt
    .block_on(scheduler.run(&request, RunContext::new(config, repository)))
    .with_context(|| format!("Cannot run '{}'", goal))?;
  info!(goal = %goal, status = ?report.status, "run finished");

  if args.output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report, started);
    if let Some(limit) = args.timeout
      && report.timed_out()
    {
      print_error(&format!(
        "Run of '{}' timed out after {}",
        goal,
        humantime::format_duration(limit)
      ));
    }
  }

  Ok(ExitCode::from(report.exit_code()))
}

fn print_report(report: &RunReport, started: SystemTime) {
  println!();
  for record in report.records() {
    print_record(record);
  }

  if !report.warnings.is_empty() {
    println!();
    for warning in &report.warnings {
      print_warning(&warning.to_string());
    }
  }

  let elapsed = SystemTime::now()
    .duration_since(started)
    .map(format_duration)
    .unwrap_or_default();

  println!();
  if report.is_success() {
    print_success(&format!("Run succeeded in {}", elapsed));
  } else {
    let failed = report.records().filter(|r| r.is_failure()).count();
    print_error(&format!("Run failed: {} target(s) did not succeed", failed));
  }
}

/// Gather branch and working-copy facts through git.
///
/// Facts that cannot be determined stay `None`; preconditions over them fail.
async fn probe_repository(root: &Path) -> RepositoryState {
  let git = ShellRunner::new().with_cwd(root);

  let branch = match git.execute(&CommandSpec::new("git rev-parse --abbrev-ref HEAD")).await {
    Ok(output) if !output.stdout.is_empty() => Some(output.stdout),
    Ok(_) => None,
    Err(err) => {
      debug!(error = %err, "could not determine branch");
      None
    }
  };

  let clean = match git.execute(&CommandSpec::new("git status --porcelain")).await {
    Ok(output) => Some(output.stdout.is_empty()),
    Err(err) => {
      debug!(error = %err, "could not determine working copy state");
      None
    }
  };

  debug!(branch = ?branch, clean = ?clean, "probed repository");
  RepositoryState { branch, clean }
}
