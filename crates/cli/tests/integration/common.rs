//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated repository root.
///
/// Each test gets its own temporary directory holding a `stagehand.json`.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create from a fixture file, copied to `stagehand.json`.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("stagehand.json"), fixture_content(name)).unwrap();
    Self { temp }
  }

  /// Canonical root path.
  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap_or_else(|_| self.temp.path().to_path_buf())
  }

  /// Write a file relative to the root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Read a file relative to the root, empty when it does not exist.
  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap_or_default()
  }

  /// Lines appended to `log.txt` by fixture commands.
  pub fn log(&self) -> Vec<String> {
    self.read_file("log.txt").lines().map(str::to_string).collect()
  }

  /// Get a pre-configured Command for the stagehand binary.
  ///
  /// Runs from the root and clears variables that would leak host settings
  /// into the run:
  /// - `CI`: would switch the default configuration to Release
  /// - `STAGEHAND_*`: configuration, partition and credentials
  pub fn stagehand_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("stagehand");
    cmd.current_dir(self.root());
    for var in [
      "CI",
      "STAGEHAND_ROOT",
      "STAGEHAND_CONFIGURATION",
      "STAGEHAND_API_KEY",
      "STAGEHAND_IGNORE_FAILED_SOURCES",
      "STAGEHAND_PARTITION",
    ] {
      cmd.env_remove(var);
    }
    cmd
  }
}
