//! Types for running a target schedule.
//!
//! This module defines the fatal error type, the per-target execution record
//! and the run report handed back to callers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::artifacts::ContractMismatchWarning;
use crate::graph::GraphError;
use crate::partition::{PartitionError, PartitionSelection};
use crate::requires::PreconditionError;
use crate::target::BodyError;

/// Errors that stop a run before or while it executes.
///
/// Per-target failures (a precondition, a body, missing artifacts) are also
/// represented here so they can be reported, but the scheduler records them in
/// the target's [`ExecutionRecord`] rather than returning them.
#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("target '{target}' cannot run the configured partition: {source}")]
  Partition {
    target: String,
    #[source]
    source: PartitionError,
  },

  #[error(transparent)]
  Precondition(#[from] PreconditionError),

  #[error("target '{target}' failed: {source}")]
  Body {
    target: String,
    #[source]
    source: BodyError,
  },

  #[error("target '{target}' consumes artifacts of '{producer}', which is not scheduled and whose artifacts are missing")]
  MissingArtifacts { target: String, producer: String },
}

impl ExecuteError {
  /// Which failure detail kind a per-target error maps to.
  pub fn kind(&self) -> FailureKind {
    match self {
      ExecuteError::Precondition(_) => FailureKind::Precondition,
      ExecuteError::MissingArtifacts { .. } => FailureKind::MissingArtifacts,
      _ => FailureKind::Body,
    }
  }
}

/// Lifecycle state of a target within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
  Pending,
  Skipped,
  Running,
  Succeeded,
  Failed,
  FailedTolerated,
}

impl fmt::Display for TargetState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TargetState::Pending => "pending",
      TargetState::Skipped => "skipped",
      TargetState::Running => "running",
      TargetState::Succeeded => "succeeded",
      TargetState::Failed => "failed",
      TargetState::FailedTolerated => "failed (tolerated)",
    };
    f.write_str(s)
  }
}

/// Why a target did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "target", rename_all = "snake_case")]
pub enum SkipReason {
  /// Every consumed artifact already exists and the run skips satisfied targets.
  ArtifactsSatisfied,
  /// The named direct dependency failed or was skipped because of a failure.
  DependencyFailed(String),
  /// The named target failed without tolerance and the run stopped.
  Aborted(String),
  /// The run's time limit passed before the target could start.
  TimedOut,
}

impl SkipReason {
  /// Whether the skip is a consequence of a failure.
  pub fn is_failure(&self) -> bool {
    !matches!(self, SkipReason::ArtifactsSatisfied)
  }
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::ArtifactsSatisfied => f.write_str("artifacts already satisfied"),
      SkipReason::DependencyFailed(name) => write!(f, "dependency '{}' failed", name),
      SkipReason::Aborted(name) => write!(f, "run aborted after '{}' failed", name),
      SkipReason::TimedOut => f.write_str("run timed out"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  Precondition,
  Body,
  MissingArtifacts,
}

/// What went wrong with a failed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
  pub kind: FailureKind,
  pub message: String,
}

/// Everything recorded about one scheduled target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
  pub target: String,
  pub state: TargetState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skip_reason: Option<SkipReason>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<FailureDetail>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub partition: Option<PartitionSelection>,
  /// Number of work items handed to the body.
  pub items: usize,
  /// Scheduled by a trigger rather than by the requested closure.
  pub triggered: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<SystemTime>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub finished_at: Option<SystemTime>,
}

impl ExecutionRecord {
  pub fn new(target: impl Into<String>, triggered: bool) -> Self {
    Self {
      target: target.into(),
      state: TargetState::Pending,
      skip_reason: None,
      failure: None,
      partition: None,
      items: 0,
      triggered,
      started_at: None,
      finished_at: None,
    }
  }

  /// Failed, tolerated, or skipped because something else failed.
  pub fn is_failure(&self) -> bool {
    match self.state {
      TargetState::Failed | TargetState::FailedTolerated => true,
      TargetState::Skipped => self.skip_reason.as_ref().is_some_and(SkipReason::is_failure),
      _ => false,
    }
  }

  pub fn duration(&self) -> Option<std::time::Duration> {
    let (start, end) = (self.started_at?, self.finished_at?);
    end.duration_since(start).ok()
  }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Succeeded,
  Failed,
}

/// Result of running a goal.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub goal: String,
  /// The final schedule, including targets appended by triggers.
  pub order: Vec<String>,
  pub records: BTreeMap<String, ExecutionRecord>,
  /// Targets whose body was invoked, in invocation order.
  pub invoked: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<ContractMismatchWarning>,
  pub status: RunStatus,
}

impl RunReport {
  pub fn get(&self, target: &str) -> Option<&ExecutionRecord> {
    self.records.get(target)
  }

  pub fn state(&self, target: &str) -> Option<TargetState> {
    self.get(target).map(|r| r.state)
  }

  /// Records in schedule order.
  pub fn records(&self) -> impl Iterator<Item = &ExecutionRecord> {
    self.order.iter().filter_map(|name| self.records.get(name))
  }

  pub fn is_success(&self) -> bool {
    self.status == RunStatus::Succeeded
  }

  /// Whether the time limit left part of the schedule unstarted.
  pub fn timed_out(&self) -> bool {
    self
      .records
      .values()
      .any(|r| r.skip_reason == Some(SkipReason::TimedOut))
  }

  pub fn exit_code(&self) -> u8 {
    if self.is_success() { 0 } else { 1 }
  }

  pub(crate) fn compute_status(records: &BTreeMap<String, ExecutionRecord>) -> RunStatus {
    if records.values().any(ExecutionRecord::is_failure) {
      RunStatus::Failed
    } else {
      RunStatus::Succeeded
    }
  }
}
