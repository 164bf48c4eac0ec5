mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stagehand_lib::consts::ENV_ROOT;

use crate::cmd::{CiArgs, RunArgs, SelectArgs};
use crate::output::OutputFormat;

/// stagehand - Target-graph build orchestration
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Repository root (default: nearest directory with a stagehand.json)
  #[arg(long, global = true, env = ENV_ROOT)]
  root: Option<PathBuf>,

  /// Path to the pipeline manifest (default: <root>/stagehand.json)
  #[arg(short, long, global = true)]
  manifest: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a goal and everything it depends on
  Run(RunArgs),

  /// Show the schedule a run would start with
  Plan(SelectArgs),

  /// List the targets of the pipeline
  List {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Validate the pipeline and its artifact contracts
  Check {
    /// Also report consumed globs that match no files on disk
    #[arg(long)]
    inspect_files: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Render CI trigger descriptors
  Ci(CiArgs),
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let location = cmd::Location {
    root: cli.root,
    manifest: cli.manifest,
  };

  match cli.command {
    Commands::Run(args) => cmd::cmd_run(&location, args),
    Commands::Plan(args) => cmd::cmd_plan(&location, args).map(|_| ExitCode::SUCCESS),
    Commands::List { output } => cmd::cmd_list(&location, output).map(|_| ExitCode::SUCCESS),
    Commands::Check { inspect_files, output } => {
      cmd::cmd_check(&location, inspect_files, output).map(|_| ExitCode::SUCCESS)
    }
    Commands::Ci(args) => cmd::cmd_ci(&location, args).map(|_| ExitCode::SUCCESS),
  }
}
