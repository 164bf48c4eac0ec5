use super::*;
use crate::config::RunConfig;
use crate::context::RepositoryState;
use crate::graph::GraphError;
use crate::partition::PartitionError;
use crate::requires::Requirement;
use crate::target::BodyError;
use crate::util::testutil::{FakeQuery, FakeRunner, Invocation, Recorder};
use tracing_test::traced_test;

fn scheduler(graph: &TargetGraph) -> Scheduler<'_> {
  scheduler_with_files(graph, Vec::<String>::new())
}

fn scheduler_with_files<I, S>(graph: &TargetGraph, files: I) -> Scheduler<'_>
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  Scheduler::new(graph, Arc::new(FakeRunner::new()), Arc::new(FakeQuery::new(files)))
}

fn context() -> RunContext {
  RunContext::default()
}

fn context_with(f: impl FnOnce(&mut RunConfig)) -> RunContext {
  let mut config = RunConfig::default();
  f(&mut config);
  RunContext::new(config, RepositoryState::default())
}

/// Clean -> Restore -> Compile -> Test -> Pack, every body recording.
fn linear(recorder: &Recorder, failing: Option<&str>) -> TargetGraph {
  let chain = [
    ("Clean", None),
    ("Restore", Some("Clean")),
    ("Compile", Some("Restore")),
    ("Test", Some("Compile")),
    ("Pack", Some("Test")),
  ];
  let targets = chain.into_iter().map(|(name, dep)| {
    let builder = Target::builder(name).depends_on(dep);
    if failing == Some(name) {
      recorder.fails(builder, "compiler error").build()
    } else {
      recorder.succeeds(builder).build()
    }
  });
  TargetGraph::from_targets(targets).unwrap()
}

fn states(report: &RunReport) -> Vec<(String, TargetState)> {
  report.records().map(|r| (r.target.clone(), r.state)).collect()
}

#[tokio::test]
async fn linear_pipeline_succeeds() {
  let recorder = Recorder::new();
  let graph = linear(&recorder, None);

  let report = scheduler(&graph).run(&RunRequest::new("Pack"), context()).await.unwrap();

  assert_eq!(report.order, vec!["Clean", "Restore", "Compile", "Test", "Pack"]);
  assert_eq!(recorder.targets(), report.order);
  assert_eq!(report.invoked, report.order);
  assert!(report.records().all(|r| r.state == TargetState::Succeeded));
  assert!(report.records().all(|r| r.duration().is_some()));
  assert_eq!(report.status, RunStatus::Succeeded);
  assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn failure_aborts_remaining_targets() {
  let recorder = Recorder::new();
  let graph = linear(&recorder, Some("Compile"));

  let report = scheduler(&graph).run(&RunRequest::new("Pack"), context()).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Clean", "Restore", "Compile"]);
  assert_eq!(report.state("Compile"), Some(TargetState::Failed));
  for skipped in ["Test", "Pack"] {
    let record = report.get(skipped).unwrap();
    assert_eq!(record.state, TargetState::Skipped);
    assert_eq!(record.skip_reason, Some(SkipReason::Aborted("Compile".to_string())));
  }
  let failure = report.get("Compile").unwrap().failure.clone().unwrap();
  assert_eq!(failure.kind, FailureKind::Body);
  assert!(failure.message.contains("compiler error"));
  assert_eq!(report.status, RunStatus::Failed);
  assert_ne!(report.exit_code(), 0);
}

#[tokio::test]
async fn partitioned_target_receives_its_share() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([recorder
    .succeeds(Target::builder("Test").partitions(2).work(["P1", "P2", "P3"]))
    .build()])
  .unwrap();

  let mut seen = Vec::new();
  for index in 0..2 {
    let ctx = context_with(|c| c.partition = Some(PartitionSelection::new(index, 2).unwrap()));
    let report = scheduler(&graph).run(&RunRequest::new("Test"), ctx).await.unwrap();
    assert!(report.is_success());
    let record = report.get("Test").unwrap();
    assert_eq!(record.partition, PartitionSelection::new(index, 2).ok());
    assert_eq!(record.items, if index == 0 { 2 } else { 1 });
  }
  for invocation in recorder.invocations() {
    seen.extend(invocation.items);
  }

  assert_eq!(
    recorder.invocations(),
    vec![
      Invocation {
        target: "Test".to_string(),
        items: vec!["P1".to_string(), "P3".to_string()],
      },
      Invocation {
        target: "Test".to_string(),
        items: vec!["P2".to_string()],
      },
    ]
  );
  seen.sort();
  assert_eq!(seen, vec!["P1", "P2", "P3"]);
}

#[tokio::test]
async fn partitioned_target_without_selection_runs_everything() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([recorder
    .succeeds(Target::builder("Test").partitions(2).work(["P1", "P2", "P3"]))
    .build()])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Test"), context()).await.unwrap();

  assert_eq!(recorder.invocations()[0].items, vec!["P1", "P2", "P3"]);
  assert_eq!(report.get("Test").unwrap().items, 3);
}

#[tokio::test]
async fn tolerated_precondition_failure_lets_siblings_run() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Compile")).build(),
    recorder
      .succeeds(
        Target::builder("Publish")
          .depends_on(["Compile"])
          .requires(Requirement::clean_working_copy())
          .proceed_after_failure(true),
      )
      .build(),
    recorder.succeeds(Target::builder("Report").depends_on(["Compile"])).build(),
  ])
  .unwrap();

  let ctx = RunContext::new(
    RunConfig::default(),
    RepositoryState {
      branch: Some("main".to_string()),
      clean: Some(false),
    },
  );
  let request = RunRequest::new("Publish").with_targets(["Report"]);
  let report = scheduler(&graph).run(&request, ctx).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Compile", "Report"]);
  let publish = report.get("Publish").unwrap();
  assert_eq!(publish.state, TargetState::FailedTolerated);
  let failure = publish.failure.clone().unwrap();
  assert_eq!(failure.kind, FailureKind::Precondition);
  assert!(failure.message.contains("working copy is clean"));
  assert_eq!(report.state("Report"), Some(TargetState::Succeeded));
  assert_eq!(report.status, RunStatus::Failed);
}

#[tokio::test]
async fn triggered_target_only_follows_its_source() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Compile")).build(),
    recorder.succeeds(Target::builder("Test").depends_on(["Compile"])).build(),
    recorder
      .succeeds(Target::builder("Coverage").depends_on(["Test"]).triggered_by(["Test"]))
      .build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Compile"), context()).await.unwrap();
  assert_eq!(report.order, vec!["Compile"]);
  assert!(report.get("Coverage").is_none());

  let recorder_targets_before = recorder.targets().len();
  let report = scheduler(&graph).run(&RunRequest::new("Test"), context()).await.unwrap();
  assert_eq!(report.order, vec!["Compile", "Test", "Coverage"]);
  assert_eq!(&recorder.targets()[recorder_targets_before..], ["Compile", "Test", "Coverage"]);
  let coverage = report.get("Coverage").unwrap();
  assert!(coverage.triggered);
  assert_eq!(coverage.state, TargetState::Succeeded);
}

#[tokio::test]
async fn failed_source_never_triggers() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.fails(Target::builder("Test").proceed_after_failure(true), "tests failed").build(),
    recorder.succeeds(Target::builder("Coverage").triggered_by(["Test"])).build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Test"), context()).await.unwrap();

  assert_eq!(report.state("Test"), Some(TargetState::FailedTolerated));
  assert!(report.get("Coverage").is_none());
  assert_eq!(recorder.targets(), vec!["Test"]);
}

#[tokio::test]
async fn triggered_target_brings_its_dependencies() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Test")).build(),
    recorder.succeeds(Target::builder("ReportTool")).build(),
    recorder
      .succeeds(Target::builder("Coverage").depends_on(["Test", "ReportTool"]).triggered_by(["Test"]))
      .build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Test"), context()).await.unwrap();

  assert_eq!(report.order, vec!["Test", "ReportTool", "Coverage"]);
  assert!(report.get("ReportTool").unwrap().triggered);
  assert!(report.is_success());
}

#[tokio::test]
async fn triggered_producer_runs_before_pending_consumer() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Test")).build(),
    recorder
      .succeeds(Target::builder("Publish").depends_on(["Test"]).consumes("Coverage"))
      .build(),
    recorder
      .succeeds(
        Target::builder("Coverage")
          .triggered_by(["Test"])
          .produces("CoverageReport.zip"),
      )
      .build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Publish"), context()).await.unwrap();

  assert_eq!(report.order, vec!["Test", "Coverage", "Publish"]);
  assert_eq!(recorder.targets(), vec!["Test", "Coverage", "Publish"]);
  assert!(report.get("Coverage").unwrap().triggered);
  assert_eq!(report.state("Publish"), Some(TargetState::Succeeded));
}

#[tokio::test]
async fn dependents_of_tolerated_failure_are_skipped() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.fails(Target::builder("Test").proceed_after_failure(true), "boom").build(),
    recorder.succeeds(Target::builder("Coverage").depends_on(["Test"])).build(),
    recorder.succeeds(Target::builder("Lint")).build(),
    recorder
      .succeeds(Target::builder("Summary").depends_on(["Coverage", "Lint"]))
      .build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Summary"), context()).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Test", "Lint"]);
  assert_eq!(
    report.get("Coverage").unwrap().skip_reason,
    Some(SkipReason::DependencyFailed("Test".to_string()))
  );
  // Skips caused by failures propagate.
  assert_eq!(
    report.get("Summary").unwrap().skip_reason,
    Some(SkipReason::DependencyFailed("Coverage".to_string()))
  );
  assert_eq!(report.state("Lint"), Some(TargetState::Succeeded));
  assert!(!report.is_success());
}

#[tokio::test]
async fn tolerant_dependent_runs_after_failure() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.fails(Target::builder("Test").proceed_after_failure(true), "boom").build(),
    recorder
      .succeeds(
        Target::builder("Coverage")
          .depends_on(["Test"])
          .tolerates_failed_dependencies(true),
      )
      .build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Coverage"), context()).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Test", "Coverage"]);
  assert_eq!(report.state("Coverage"), Some(TargetState::Succeeded));
  assert_eq!(report.status, RunStatus::Failed);
}

fn pack_publish(recorder: &Recorder) -> TargetGraph {
  TargetGraph::from_targets([
    recorder
      .succeeds(Target::builder("Pack").produces("Output/packages/*.nupkg"))
      .build(),
    recorder
      .succeeds(Target::builder("Publish").depends_on(["Pack"]).consumes("Pack"))
      .build(),
  ])
  .unwrap()
}

#[tokio::test]
async fn satisfied_consumer_is_skipped_when_requested() {
  let recorder = Recorder::new();
  let graph = pack_publish(&recorder);
  let sched = scheduler_with_files(&graph, ["Output/packages/Parser.1.0.0.nupkg"]);

  let ctx = context_with(|c| c.skip_satisfied = true);
  let report = sched.run(&RunRequest::new("Publish"), ctx).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Pack"]);
  let publish = report.get("Publish").unwrap();
  assert_eq!(publish.state, TargetState::Skipped);
  assert_eq!(publish.skip_reason, Some(SkipReason::ArtifactsSatisfied));
  assert!(report.is_success());
}

#[tokio::test]
async fn satisfied_consumer_runs_without_skip_flag() {
  let recorder = Recorder::new();
  let graph = pack_publish(&recorder);
  let sched = scheduler_with_files(&graph, ["Output/packages/Parser.1.0.0.nupkg"]);

  let report = sched.run(&RunRequest::new("Publish"), context()).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Pack", "Publish"]);
  assert!(report.is_success());
  assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn unsatisfied_consumer_runs_with_skip_flag() {
  let recorder = Recorder::new();
  let graph = pack_publish(&recorder);

  let ctx = context_with(|c| c.skip_satisfied = true);
  let report = scheduler(&graph).run(&RunRequest::new("Publish"), ctx).await.unwrap();

  assert_eq!(recorder.targets(), vec!["Pack", "Publish"]);
  // Pack succeeded without leaving packages behind.
  assert_eq!(report.warnings.len(), 1);
  assert_eq!(report.warnings[0].kind, MismatchKind::NoMatchingFiles);
}

#[tokio::test]
#[traced_test]
async fn unmet_outputs_are_logged() {
  let recorder = Recorder::new();
  let graph = pack_publish(&recorder);

  scheduler(&graph).run(&RunRequest::new("Publish"), context()).await.unwrap();

  assert!(logs_contain("artifact contract not met"));
  assert!(logs_contain("Output/packages/*.nupkg"));
}

#[tokio::test]
async fn missing_artifacts_of_unscheduled_producer_fail() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Test").produces("Coverage/*.xml")).build(),
    recorder.succeeds(Target::builder("Coverage").consumes("Test")).build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Coverage"), context()).await.unwrap();

  assert!(recorder.targets().is_empty());
  let record = report.get("Coverage").unwrap();
  assert_eq!(record.state, TargetState::Failed);
  assert_eq!(record.failure.as_ref().unwrap().kind, FailureKind::MissingArtifacts);

  let sched = scheduler_with_files(&graph, ["Coverage/Parser.xml"]);
  let report = sched.run(&RunRequest::new("Coverage"), context()).await.unwrap();
  assert!(report.is_success());
}

#[tokio::test]
async fn invalid_partition_is_fatal_before_anything_runs() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Compile")).build(),
    recorder
      .succeeds(Target::builder("Test").depends_on(["Compile"]).partitions(2).work(["P1"]))
      .build(),
  ])
  .unwrap();

  let ctx = context_with(|c| c.partition = Some(PartitionSelection::new(2, 3).unwrap()));
  let err = scheduler(&graph).run(&RunRequest::new("Test"), ctx).await.unwrap_err();

  assert!(matches!(
    err,
    ExecuteError::Partition {
      ref target,
      source: PartitionError::InvalidIndex { index: 2, count: 2 },
    } if target == "Test"
  ));
  assert!(recorder.targets().is_empty());
}

#[tokio::test]
async fn partition_of_triggerable_target_is_checked_up_front() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Test")).build(),
    recorder
      .succeeds(Target::builder("Coverage").triggered_by(["Test"]).partitions(2))
      .build(),
  ])
  .unwrap();

  let ctx = context_with(|c| c.partition = Some(PartitionSelection::new(0, 3).unwrap()));
  let err = scheduler(&graph).run(&RunRequest::new("Test"), ctx).await.unwrap_err();

  assert!(matches!(
    err,
    ExecuteError::Partition {
      source: PartitionError::CountMismatch { declared: 2, .. },
      ..
    }
  ));
  assert!(recorder.targets().is_empty());
}

#[tokio::test]
async fn cycle_fails_before_any_body() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("A").depends_on(["B"])).build(),
    recorder.succeeds(Target::builder("B").depends_on(["A"])).build(),
  ])
  .unwrap();

  let err = scheduler(&graph).run(&RunRequest::new("A"), context()).await.unwrap_err();

  assert!(matches!(err, ExecuteError::Graph(GraphError::CyclicDependency { .. })));
  assert!(recorder.targets().is_empty());
}

#[tokio::test]
async fn unknown_goal_is_an_error() {
  let graph = TargetGraph::new();
  let err = scheduler(&graph).run(&RunRequest::new("Deploy"), context()).await.unwrap_err();
  assert!(matches!(err, ExecuteError::Graph(GraphError::TargetNotFound(ref name)) if name == "Deploy"));
}

#[tokio::test]
async fn forced_targets_join_the_schedule() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    recorder.succeeds(Target::builder("Clean")).build(),
    recorder.succeeds(Target::builder("Restore").after(["Clean"])).build(),
    recorder.succeeds(Target::builder("Compile").depends_on(["Restore"])).build(),
  ])
  .unwrap();

  let plain = scheduler(&graph).run(&RunRequest::new("Compile"), context()).await.unwrap();
  assert_eq!(plain.order, vec!["Restore", "Compile"]);

  let forced = RunRequest::new("Compile").with_targets(["Clean"]);
  let report = scheduler(&graph).run(&forced, context()).await.unwrap();
  assert_eq!(report.order, vec!["Clean", "Restore", "Compile"]);
}

#[tokio::test]
async fn runs_are_deterministic() {
  let recorder = Recorder::new();
  let graph = linear(&recorder, None);
  let sched = scheduler(&graph);

  let first = sched.run(&RunRequest::new("Pack"), context()).await.unwrap();
  let second = sched.run(&RunRequest::new("Pack"), context()).await.unwrap();

  assert_eq!(first.order, second.order);
  assert_eq!(states(&first), states(&second));
}

#[tokio::test]
async fn body_sees_schedule_and_configuration() {
  let graph = TargetGraph::from_targets([
    Target::builder("Restore").build(),
    Target::builder("Compile")
      .depends_on(["Restore"])
      .executes(|ctx| async move {
        if ctx.is_scheduled("Restore") && ctx.run.configuration().as_str() == "Debug" {
          Ok(())
        } else {
          Err(BodyError::msg("unexpected context"))
        }
      })
      .build(),
  ])
  .unwrap();

  let report = scheduler(&graph).run(&RunRequest::new("Compile"), context()).await.unwrap();

  assert!(report.is_success());
  // Restore has no body and succeeds without being invoked.
  assert_eq!(report.invoked, vec!["Compile"]);
}

#[tokio::test]
async fn plan_returns_initial_schedule() {
  let recorder = Recorder::new();
  let graph = linear(&recorder, None);
  assert_eq!(
    scheduler(&graph).plan(&RunRequest::new("Test")).unwrap(),
    vec!["Clean", "Restore", "Compile", "Test"]
  );
  assert!(recorder.targets().is_empty());
}

#[tokio::test]
async fn report_serializes_to_json() {
  let recorder = Recorder::new();
  let graph = linear(&recorder, Some("Test"));
  let report = scheduler(&graph).run(&RunRequest::new("Pack"), context()).await.unwrap();

  let json = serde_json::to_value(&report).unwrap();
  assert_eq!(json["status"], "failed");
  assert_eq!(json["records"]["Test"]["state"], "failed");
  assert_eq!(json["records"]["Pack"]["skip_reason"]["reason"], "aborted");
}

#[tokio::test]
async fn time_limit_skips_targets_not_yet_started() {
  let recorder = Recorder::new();
  let graph = TargetGraph::from_targets([
    Target::builder("Compile")
      .executes(|_| async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        Ok(())
      })
      .build(),
    recorder.succeeds(Target::builder("Test").depends_on(["Compile"])).build(),
    recorder.succeeds(Target::builder("Pack").depends_on(["Test"])).build(),
  ])
  .unwrap();

  let ctx = context_with(|c| c.timeout = Some(std::time::Duration::from_millis(10)));
  let report = scheduler(&graph).run(&RunRequest::new("Pack"), ctx).await.unwrap();

  // The running body is never interrupted.
  assert_eq!(report.state("Compile"), Some(TargetState::Succeeded));
  assert!(recorder.targets().is_empty());
  for name in ["Test", "Pack"] {
    let record = report.get(name).unwrap();
    assert_eq!(record.state, TargetState::Skipped);
    assert_eq!(record.skip_reason, Some(SkipReason::TimedOut));
  }
  assert!(report.timed_out());
  assert_eq!(report.status, RunStatus::Failed);
}
