//! External command execution.
//!
//! Bodies never spawn processes directly. They go through a [`CommandRunner`]
//! so tests can substitute a recording fake for the real shell.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::target::BoxFuture;

/// A single shell command with its environment overrides and working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
  pub cmd: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
}

impl CommandSpec {
  pub fn new(cmd: impl Into<String>) -> Self {
    Self {
      cmd: cmd.into(),
      ..Default::default()
    }
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }
}

/// Outcome of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Trimmed stdout. Empty when output was streamed to the terminal.
  pub stdout: String,
  pub code: Option<i32>,
}

#[derive(Debug, Error)]
pub enum CommandError {
  #[error("command failed with exit code {code:?}: {cmd}")]
  Failed { cmd: String, code: Option<i32> },

  #[error("failed to spawn '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },
}

/// Capability to run external commands.
pub trait CommandRunner: Send + Sync {
  fn execute<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<CommandOutput, CommandError>>;
}

/// How a [`ShellRunner`] treats the child's standard streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
  /// Collect stdout and return it; stderr is logged at debug level.
  #[default]
  Capture,
  /// Stream to the parent's terminal.
  Inherit,
}

/// Runs commands through the platform shell, inheriting the parent environment.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
  shell: Option<String>,
  mode: OutputMode,
  cwd: Option<PathBuf>,
}

impl ShellRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Override the shell (`bash`, `pwsh`, `cmd`, ...).
  pub fn with_shell(mut self, shell: Option<String>) -> Self {
    self.shell = shell;
    self
  }

  pub fn with_mode(mut self, mode: OutputMode) -> Self {
    self.mode = mode;
    self
  }

  /// Working directory used when a spec does not name its own.
  pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
    info!(cmd = %spec.cmd, "executing command");

    let (shell_cmd, shell_args) = get_shell(self.shell.as_deref());
    let mut command = Command::new(&shell_cmd);
    command
      .args(&shell_args)
      .arg(&spec.cmd)
      .envs(&spec.env)
      .kill_on_drop(true);

    if let Some(cwd) = spec.cwd.as_ref().or(self.cwd.as_ref()) {
      command.current_dir(cwd);
    }

    debug!(shell = %shell_cmd, cwd = ?spec.cwd, mode = ?self.mode, "spawning process");

    let spawn_err = |source| CommandError::Spawn {
      cmd: spec.cmd.clone(),
      source,
    };

    match self.mode {
      OutputMode::Inherit => {
        let status = command
          .stdin(Stdio::null())
          .stdout(Stdio::inherit())
          .stderr(Stdio::inherit())
          .status()
          .await
          .map_err(spawn_err)?;

        if !status.success() {
          return Err(CommandError::Failed {
            cmd: spec.cmd.clone(),
            code: status.code(),
          });
        }

        Ok(CommandOutput {
          stdout: String::new(),
          code: status.code(),
        })
      }
      OutputMode::Capture => {
        let output = command.stdin(Stdio::null()).output().await.map_err(spawn_err)?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

        if !output.status.success() {
          let stderr = String::from_utf8_lossy(&output.stderr);
          if !stderr.is_empty() {
            debug!(stderr = %stderr, "command stderr");
          }
          if !stdout.is_empty() {
            debug!(stdout = %stdout, "command stdout");
          }
          return Err(CommandError::Failed {
            cmd: spec.cmd.clone(),
            code: output.status.code(),
          });
        }

        if !stdout.is_empty() {
          debug!(stdout = %stdout, "command output");
        }

        Ok(CommandOutput {
          stdout,
          code: output.status.code(),
        })
      }
    }
  }
}

impl CommandRunner for ShellRunner {
  fn execute<'a>(&'a self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<CommandOutput, CommandError>> {
    Box::pin(self.run(spec))
  }
}

/// Shell program and the argument that introduces the command string.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    (
      "powershell.exe".to_string(),
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    )
  }
}
