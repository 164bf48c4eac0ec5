//! Run configuration.
//!
//! Everything a run can be parameterized with is collected in [`RunConfig`]
//! and handed to the scheduler at start. Nothing is discovered implicitly
//! later on; bodies read the values through the run context.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::ENV_CI;
use crate::partition::PartitionSelection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("unknown configuration '{0}': expected Debug or Release")]
  UnknownConfiguration(String),
}

/// Build configuration handed to the compiler and packager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Configuration {
  #[default]
  Debug,
  Release,
}

impl Configuration {
  /// Debug on a developer machine, Release on CI.
  pub fn for_host(host: Host) -> Self {
    match host {
      Host::Local => Configuration::Debug,
      Host::Ci => Configuration::Release,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Configuration::Debug => "Debug",
      Configuration::Release => "Release",
    }
  }
}

impl fmt::Display for Configuration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Configuration {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "debug" => Ok(Configuration::Debug),
      "release" => Ok(Configuration::Release),
      _ => Err(ConfigError::UnknownConfiguration(s.to_string())),
    }
  }
}

/// Where the process runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Host {
  #[default]
  Local,
  Ci,
}

impl Host {
  /// `Ci` when the `CI` variable is set to anything but an empty string,
  /// `0` or `false`.
  pub fn detect() -> Self {
    match std::env::var(ENV_CI) {
      Ok(value) if !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false") => Host::Ci,
      _ => Host::Local,
    }
  }
}

/// Options recognized by a run.
#[derive(Clone)]
pub struct RunConfig {
  /// Build configuration. Defaults to [`Configuration::for_host`].
  pub configuration: Configuration,

  pub host: Host,

  /// Token used by publishing bodies.
  pub api_key: Option<String>,

  /// Forwarded to package restore commands.
  pub ignore_failed_sources: bool,

  /// Active partition supplied by the invoking CI matrix.
  pub partition: Option<PartitionSelection>,

  /// Skip targets whose consumed artifacts already exist.
  pub skip_satisfied: bool,

  /// Targets not started within this long after the run began are skipped.
  /// A body that is already running is never interrupted.
  pub timeout: Option<Duration>,

  /// Artifact root; contract globs are relative to it.
  pub root: PathBuf,
}

impl RunConfig {
  /// Defaults for the given host, rooted at `root`.
  pub fn for_host(host: Host, root: impl Into<PathBuf>) -> Self {
    Self {
      configuration: Configuration::for_host(host),
      host,
      api_key: None,
      ignore_failed_sources: false,
      partition: None,
      skip_satisfied: false,
      timeout: None,
      root: root.into(),
    }
  }

  /// Defaults for the detected host.
  pub fn detect(root: impl Into<PathBuf>) -> Self {
    Self::for_host(Host::detect(), root)
  }
}

impl Default for RunConfig {
  fn default() -> Self {
    Self::for_host(Host::Local, ".")
  }
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for RunConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunConfig")
      .field("configuration", &self.configuration)
      .field("host", &self.host)
      .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
      .field("ignore_failed_sources", &self.ignore_failed_sources)
      .field("partition", &self.partition)
      .field("skip_satisfied", &self.skip_satisfied)
      .field("timeout", &self.timeout)
      .field("root", &self.root)
      .finish()
  }
}
