//! Run command integration tests.
//!
//! Fixture commands go through `/bin/sh`, so these only run on unix.

#![cfg(unix)]

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn linear_pipeline_runs_in_dependency_order() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Running 'Pack' (Debug)"))
    .stdout(predicate::str::contains("Run succeeded"));

  assert_eq!(env.log(), vec!["Clean", "Restore", "Compile Debug", "Test", "Pack"]);
}

#[test]
fn configuration_flag_reaches_commands() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .args(["run", "Compile", "--configuration", "release"])
    .assert()
    .success();

  assert_eq!(env.log(), vec!["Clean", "Restore", "Compile Release"]);
}

#[test]
fn configuration_defaults_to_release_on_ci() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .args(["run", "Compile"])
    .env("CI", "true")
    .assert()
    .success();

  assert_eq!(env.log().last().map(String::as_str), Some("Compile Release"));
}

#[test]
fn failure_aborts_the_rest_of_the_schedule() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .arg("run")
    .env("STAGEHAND_TEST_FAIL", "1")
    .assert()
    .code(1)
    .stdout(predicate::str::contains("run aborted after 'Compile' failed"))
    .stderr(predicate::str::contains("Run failed"));

  assert_eq!(env.log(), vec!["Clean", "Restore"]);
}

#[test]
fn forced_targets_join_the_schedule() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .args(["run", "Pack", "--target", "Docs"])
    .assert()
    .success();

  assert_eq!(env.log(), vec!["Clean", "Restore", "Compile Debug", "Test", "Pack", "Docs"]);
}

#[test]
fn unknown_goal_fails_before_anything_runs() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .args(["run", "Deploy"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no target named 'Deploy'"));

  assert!(env.log().is_empty());
}

#[test]
fn json_report_lists_every_record() {
  let env = TestEnv::from_fixture("linear.json");

  let output = env
    .stagehand_cmd()
    .args(["run", "Restore", "--output", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(report["goal"], "Restore");
  assert_eq!(report["status"], "succeeded");
  assert_eq!(report["order"], serde_json::json!(["Clean", "Restore"]));
  assert_eq!(report["records"]["Clean"]["state"], "succeeded");
}

#[test]
fn partitions_split_the_work_items() {
  let env = TestEnv::from_fixture("partitioned.json");

  env
    .stagehand_cmd()
    .args(["run", "--partition", "0/2"])
    .assert()
    .success()
    .stdout(predicate::str::contains("partition 0/2, 2 item(s)"));
  assert_eq!(env.log(), vec!["P1", "P3"]);

  std::fs::remove_file(env.temp.path().join("log.txt")).unwrap();

  env
    .stagehand_cmd()
    .arg("run")
    .env("STAGEHAND_PARTITION", "1/2")
    .assert()
    .success();
  assert_eq!(env.log(), vec!["P2"]);
}

#[test]
fn no_partition_runs_every_item() {
  let env = TestEnv::from_fixture("partitioned.json");

  env.stagehand_cmd().arg("run").assert().success();

  assert_eq!(env.log(), vec!["P1", "P2", "P3"]);
}

#[test]
fn mismatched_partition_count_is_fatal() {
  let env = TestEnv::from_fixture("partitioned.json");

  env
    .stagehand_cmd()
    .args(["run", "--partition", "0/3"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("cannot run the configured partition"));

  assert!(env.log().is_empty());
}

#[test]
fn tolerated_precondition_failure_lets_independent_targets_run() {
  let env = TestEnv::from_fixture("tolerated.json");

  env
    .stagehand_cmd()
    .args(["run", "--target", "Announce", "--target", "Docs"])
    .assert()
    .code(1)
    .stdout(predicate::str::contains("failed (tolerated)"))
    .stdout(predicate::str::contains("feed key present"))
    .stdout(predicate::str::contains("dependency 'Publish' failed"));

  assert_eq!(env.log(), vec!["Pack", "Docs"]);
}

#[test]
fn satisfied_precondition_runs_the_body() {
  let env = TestEnv::from_fixture("tolerated.json");

  env
    .stagehand_cmd()
    .arg("run")
    .env("STAGEHAND_TEST_FEED_KEY", "oy2key")
    .assert()
    .success();

  assert_eq!(env.log(), vec!["Pack", "Publish"]);
}

#[test]
fn trigger_fires_after_success() {
  let env = TestEnv::from_fixture("triggers.json");

  env
    .stagehand_cmd()
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("(triggered)"));

  assert_eq!(env.log(), vec!["Compile", "Test", "Coverage"]);
}

#[test]
fn trigger_does_not_fire_after_failure() {
  let env = TestEnv::from_fixture("triggers.json");

  env
    .stagehand_cmd()
    .arg("run")
    .env("STAGEHAND_TEST_FAIL", "1")
    .assert()
    .code(1)
    .stdout(predicate::str::contains("(triggered)").not());

  assert_eq!(env.log(), vec!["Compile"]);
}

#[test]
fn satisfied_consumer_is_skipped_on_request() {
  let env = TestEnv::from_fixture("triggers.json");

  env
    .stagehand_cmd()
    .args(["run", "Coverage", "--skip-satisfied"])
    .assert()
    .success()
    .stdout(predicate::str::contains("artifacts already satisfied"));

  assert_eq!(env.log(), vec!["Compile", "Test"]);
}

#[test]
fn timeout_stops_before_the_next_target() {
  let env = TestEnv::from_fixture("linear.json");
  env.write_file(
    "stagehand.json",
    r#"{
      "default_target": "Pack",
      "targets": [
        { "name": "Wait", "commands": ["sleep 1", "echo Wait >> log.txt"] },
        { "name": "Pack", "depends_on": ["Wait"], "commands": ["echo Pack >> log.txt"] }
      ]
    }"#,
  );

  env
    .stagehand_cmd()
    .args(["run", "--timeout", "200ms"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("Wait succeeded"))
    .stdout(predicate::str::contains("Pack skipped (run timed out)"))
    .stderr(predicate::str::contains("timed out after 200ms"));

  // The running target finished; the next one never started.
  assert_eq!(env.log(), vec!["Wait"]);
}
