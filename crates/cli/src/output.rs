//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, target state lines, durations and Unicode symbols.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use stagehand_lib::execute::types::{ExecutionRecord, TargetState};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const SKIP: &str = "-";
  pub const PENDING: &str = " ";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// One line per scheduled target: symbol, name, state detail and duration.
pub fn print_record(record: &ExecutionRecord) {
  let detail = match record.state {
    TargetState::Skipped => match &record.skip_reason {
      Some(reason) => format!("skipped ({})", reason),
      None => "skipped".to_string(),
    },
    TargetState::Failed | TargetState::FailedTolerated => match &record.failure {
      Some(failure) => format!("{}: {}", record.state, failure.message),
      None => record.state.to_string(),
    },
    state => state.to_string(),
  };

  let mut suffix = String::new();
  if let Some(partition) = record.partition {
    suffix.push_str(&format!(" [partition {}, {} item(s)]", partition, record.items));
  }
  if record.triggered {
    suffix.push_str(" (triggered)");
  }
  if let Some(duration) = record.duration() {
    suffix.push_str(&format!(" {}", format_duration(duration)));
  }

  match record.state {
    TargetState::Succeeded => println!(
      "{} {} {}{}",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
      record.target,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      suffix
    ),
    TargetState::Failed => println!(
      "{} {} {}{}",
      symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
      record.target,
      detail.if_supports_color(Stream::Stdout, |s| s.red()),
      suffix
    ),
    TargetState::FailedTolerated => println!(
      "{} {} {}{}",
      symbols::WARNING.if_supports_color(Stream::Stdout, |s| s.yellow()),
      record.target,
      detail.if_supports_color(Stream::Stdout, |s| s.yellow()),
      suffix
    ),
    TargetState::Skipped => println!(
      "{} {} {}{}",
      symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      record.target,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      suffix
    ),
    TargetState::Pending | TargetState::Running => {
      println!("{} {} {}{}", symbols::PENDING, record.target, detail, suffix)
    }
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
