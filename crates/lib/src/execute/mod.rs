//! Target execution.
//!
//! The [`Scheduler`] turns a goal into a schedule and runs it:
//!
//! 1. Validate the graph
//! 2. Take the closure of the goal (plus forced targets) and order it
//! 3. Check that every partitioned target accepts the configured partition
//! 4. Walk the schedule, deciding per target whether to skip, fail or run it
//! 5. Add triggered targets after each success, reordering what has not run yet
//!
//! Targets run one at a time. A failure either aborts the rest of the schedule
//! or, for targets that proceed after failure, is recorded and tolerated. A
//! configured time limit is only checked between targets.

pub mod actions;
pub mod command;
pub mod resolver;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactTracker, ContractMismatchWarning, FileQuery, MismatchKind};
use crate::context::RunContext;
use crate::graph::TargetGraph;
use crate::partition::PartitionSelection;
use crate::requires;
use crate::target::{BodyContext, Target};

use command::CommandRunner;
pub use types::{
  ExecuteError, ExecutionRecord, FailureDetail, FailureKind, RunReport, RunStatus, SkipReason, TargetState,
};

/// What to run: a goal plus targets forced into the schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
  pub goal: String,
  pub targets: Vec<String>,
}

impl RunRequest {
  pub fn new(goal: impl Into<String>) -> Self {
    Self {
      goal: goal.into(),
      targets: Vec::new(),
    }
  }

  /// Force additional targets (and their dependencies) into the schedule.
  pub fn with_targets<I, S>(mut self, targets: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.targets.extend(targets.into_iter().map(Into::into));
    self
  }

  fn roots(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.goal.as_str()).chain(self.targets.iter().map(String::as_str))
  }
}

/// Outcome of evaluating a single target before and during its body.
enum Outcome {
  Succeeded,
  Skipped(SkipReason),
  Failed(ExecuteError),
}

/// Recorded once a target passed its checks and resolved its work items.
struct Started {
  at: SystemTime,
  partition: Option<PartitionSelection>,
  items: usize,
}

/// Runs goals against one validated graph.
pub struct Scheduler<'g> {
  graph: &'g TargetGraph,
  runner: Arc<dyn CommandRunner>,
  query: Arc<dyn FileQuery>,
}

impl<'g> Scheduler<'g> {
  pub fn new(graph: &'g TargetGraph, runner: Arc<dyn CommandRunner>, query: Arc<dyn FileQuery>) -> Self {
    Self { graph, runner, query }
  }

  /// The initial schedule for `request`, before any trigger fires.
  pub fn plan(&self, request: &RunRequest) -> Result<Vec<String>, ExecuteError> {
    self.graph.validate()?;
    let closure = self.graph.closure_for_all(request.roots())?;
    Ok(self.graph.order_for(&closure)?)
  }

  /// Run `request` to completion.
  ///
  /// Returns `Err` only for problems found before anything executes (an
  /// invalid graph, an unknown goal, a partition the schedule cannot run).
  /// Target failures are reported through the returned [`RunReport`].
  pub async fn run(&self, request: &RunRequest, ctx: RunContext) -> Result<RunReport, ExecuteError> {
    let mut schedule = self.plan(request)?;
    self.check_partitions(&schedule, &ctx)?;

    info!(goal = %request.goal, targets = schedule.len(), "starting run");

    let deadline = ctx.config().timeout.map(|limit| Instant::now() + limit);
    let run = Arc::new(ctx);
    let tracker = ArtifactTracker::new(self.graph, &*self.query);
    let mut scheduled: BTreeSet<String> = schedule.iter().cloned().collect();
    let mut records: BTreeMap<String, ExecutionRecord> = schedule
      .iter()
      .map(|name| (name.clone(), ExecutionRecord::new(name.clone(), false)))
      .collect();
    let mut invoked = Vec::new();

    let mut cursor = 0;
    while cursor < schedule.len() {
      if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        warn!(remaining = schedule.len() - cursor, "time limit reached, skipping remaining targets");
        for rest in &schedule[cursor..] {
          if let Some(record) = records.get_mut(rest) {
            record.state = TargetState::Skipped;
            record.skip_reason = Some(SkipReason::TimedOut);
          }
        }
        break;
      }

      let name = schedule[cursor].clone();
      cursor += 1;

      let Some(target) = self.graph.get(&name) else {
        continue;
      };

      let mut started = None;
      let outcome = self
        .evaluate(target, &run, &tracker, &scheduled, &records, &mut started)
        .await;

      let Some(record) = records.get_mut(&name) else {
        continue;
      };
      if let Some(started) = started {
        if target.body().is_some() {
          invoked.push(name.clone());
        }
        record.started_at = Some(started.at);
        record.partition = started.partition;
        record.items = started.items;
      }

      match outcome {
        Outcome::Skipped(reason) => {
          debug!(name = %name, reason = %reason, "target skipped");
          record.state = TargetState::Skipped;
          record.skip_reason = Some(reason);
        }
        Outcome::Succeeded => {
          record.state = TargetState::Succeeded;
          record.finished_at = Some(SystemTime::now());
          info!(name = %name, "target succeeded");

          let appended = self.triggered_by_success(&name, &scheduled)?;
          if !appended.is_empty() {
            for added in &appended {
              debug!(name = %added, source = %name, "scheduling triggered target");
              scheduled.insert(added.clone());
              records.insert(added.clone(), ExecutionRecord::new(added.clone(), true));
            }
            // Pending targets may consume or follow what was just added.
            let pending: BTreeSet<String> = schedule.drain(cursor..).chain(appended).collect();
            schedule.extend(self.graph.order_for(&pending)?);
          }
        }
        Outcome::Failed(err) => {
          record.finished_at = Some(SystemTime::now());
          record.failure = Some(FailureDetail {
            kind: err.kind(),
            message: err.to_string(),
          });

          if target.proceed_after_failure() {
            warn!(name = %name, error = %err, "target failed, continuing");
            record.state = TargetState::FailedTolerated;
          } else {
            warn!(name = %name, error = %err, "target failed, aborting run");
            record.state = TargetState::Failed;
            for rest in &schedule[cursor..] {
              if let Some(record) = records.get_mut(rest) {
                record.state = TargetState::Skipped;
                record.skip_reason = Some(SkipReason::Aborted(name.clone()));
              }
            }
            break;
          }
        }
      }
    }

    let warnings = self.unmet_outputs(&schedule, &records, &tracker);
    for warning in &warnings {
      warn!(warning = %warning, "artifact contract not met");
    }

    let status = RunReport::compute_status(&records);
    info!(goal = %request.goal, status = ?status, invoked = invoked.len(), "run finished");

    Ok(RunReport {
      goal: request.goal.clone(),
      order: schedule,
      records,
      invoked,
      warnings,
      status,
    })
  }

  /// Decide what happens to `target` and run its body if it gets that far.
  async fn evaluate(
    &self,
    target: &Target,
    run: &Arc<RunContext>,
    tracker: &ArtifactTracker<'_>,
    scheduled: &BTreeSet<String>,
    records: &BTreeMap<String, ExecutionRecord>,
    started: &mut Option<Started>,
  ) -> Outcome {
    let name = target.name();

    if run.config().skip_satisfied && tracker.consumes_satisfied(name) {
      return Outcome::Skipped(SkipReason::ArtifactsSatisfied);
    }

    if !target.tolerates_failed_dependencies()
      && let Some(failed) = self.failed_dependency(target, records)
    {
      return Outcome::Skipped(SkipReason::DependencyFailed(failed.to_string()));
    }

    for consume in target.consumes() {
      if !scheduled.contains(&consume.target) && !tracker.is_satisfied(name, consume) {
        return Outcome::Failed(ExecuteError::MissingArtifacts {
          target: name.to_string(),
          producer: consume.target.clone(),
        });
      }
    }

    if let Err(err) = requires::evaluate(name, target.requires(), run) {
      return Outcome::Failed(err.into());
    }

    let (items, partition) = match target.partitions() {
      Some(declared) => match PartitionSelection::resolve(run.config().partition, declared) {
        Ok(selection) => (selection.select(target.work()), Some(selection)),
        Err(source) => {
          return Outcome::Failed(ExecuteError::Partition {
            target: name.to_string(),
            source,
          });
        }
      },
      None => (target.work().to_vec(), None),
    };

    *started = Some(Started {
      at: SystemTime::now(),
      partition,
      items: items.len(),
    });

    let Some(body) = target.body() else {
      debug!(name = %name, "target has no body");
      return Outcome::Succeeded;
    };

    info!(name = %name, items = items.len(), partition = ?partition, "running target");

    let ctx = BodyContext::new(
      name,
      items,
      partition,
      run.clone(),
      self.runner.clone(),
      Arc::new(scheduled.clone()),
    );

    match body(ctx).await {
      Ok(()) => Outcome::Succeeded,
      Err(source) => Outcome::Failed(ExecuteError::Body {
        target: name.to_string(),
        source,
      }),
    }
  }

  /// The first direct dependency or scheduled producer that ended in failure.
  fn failed_dependency<'t>(&self, target: &'t Target, records: &BTreeMap<String, ExecutionRecord>) -> Option<&'t str> {
    target
      .depends_on()
      .iter()
      .map(String::as_str)
      .chain(target.consumes().iter().map(|c| c.target.as_str()))
      .find(|dep| records.get(*dep).is_some_and(ExecutionRecord::is_failure))
  }

  /// Targets to append after `source` succeeded: each unscheduled target it
  /// triggers, preceded by that target's unscheduled dependencies.
  fn triggered_by_success(&self, source: &str, scheduled: &BTreeSet<String>) -> Result<Vec<String>, ExecuteError> {
    let mut appended = Vec::new();
    let mut seen = scheduled.clone();

    for triggered in self.graph.triggered_from(source) {
      if seen.contains(triggered.name()) {
        continue;
      }
      let missing: BTreeSet<String> = self
        .graph
        .closure_for(triggered.name())?
        .into_iter()
        .filter(|n| !seen.contains(n))
        .collect();
      for name in self.graph.order_for(&missing)? {
        seen.insert(name.clone());
        appended.push(name);
      }
    }

    Ok(appended)
  }

  /// Fail fast when a partitioned target that may run cannot accept the
  /// configured partition. Targets reachable through triggers are included.
  fn check_partitions(&self, schedule: &[String], ctx: &RunContext) -> Result<(), ExecuteError> {
    let mut reachable: BTreeSet<String> = schedule.iter().cloned().collect();
    let mut pending: Vec<String> = schedule.to_vec();

    while let Some(name) = pending.pop() {
      for triggered in self.graph.triggered_from(&name) {
        for dep in self.graph.closure_for(triggered.name())? {
          if reachable.insert(dep.clone()) {
            pending.push(dep);
          }
        }
      }
    }

    for target in self.graph.iter().filter(|t| reachable.contains(t.name())) {
      if let Some(declared) = target.partitions() {
        PartitionSelection::resolve(ctx.config().partition, declared).map_err(|source| ExecuteError::Partition {
          target: target.name().to_string(),
          source,
        })?;
      }
    }

    Ok(())
  }

  /// Consumed producers that succeeded but left nothing matching their globs.
  fn unmet_outputs(
    &self,
    schedule: &[String],
    records: &BTreeMap<String, ExecutionRecord>,
    tracker: &ArtifactTracker<'_>,
  ) -> Vec<ContractMismatchWarning> {
    let succeeded = |name: &str| records.get(name).is_some_and(|r| r.state == TargetState::Succeeded);
    let mut warnings = Vec::new();

    for consumer in schedule.iter().filter_map(|n| self.graph.get(n)) {
      for consume in consumer.consumes() {
        if !succeeded(&consume.target) {
          continue;
        }
        for glob in tracker.globs_for(consume) {
          if !self.query.any_match(&glob) {
            warnings.push(ContractMismatchWarning {
              consumer: consumer.name().to_string(),
              producer: consume.target.clone(),
              glob: Some(glob),
              kind: MismatchKind::NoMatchingFiles,
            });
          }
        }
      }
    }

    warnings
  }
}

#[cfg(test)]
mod tests;
