//! CI command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

fn descriptors(env: &TestEnv, args: &[&str]) -> Vec<serde_json::Value> {
  let output = env
    .stagehand_cmd()
    .arg("ci")
    .args(args)
    .args(["-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  serde_json::from_slice(&output).unwrap()
}

#[test]
fn matrix_fans_out_over_images_and_partitions() {
  let env = TestEnv::from_fixture("ci.json");

  let all = descriptors(&env, &[]);
  assert_eq!(all.len(), 2);

  let continuous = &all[0];
  assert_eq!(continuous["name"], "continuous");
  assert_eq!(continuous["matrix"].as_array().unwrap().len(), 4);
  assert_eq!(
    continuous["targets"],
    serde_json::json!(["Compile", "Test", "Pack", "Publish"])
  );

  let release = &all[1];
  assert_eq!(release["matrix"].as_array().unwrap().len(), 1);
  assert_eq!(release["publish_artifacts"], true);
}

#[test]
fn push_filter_selects_triggers() {
  let env = TestEnv::from_fixture("ci.json");

  let names = |branch: &str| -> Vec<String> {
    descriptors(&env, &["--push", branch])
      .iter()
      .map(|d| d["name"].as_str().unwrap().to_string())
      .collect()
  };

  assert_eq!(names("main"), vec!["release"]);
  assert_eq!(names("release/2.0"), vec!["release"]);
  assert_eq!(names("feature/parser"), vec!["continuous"]);
}

#[test]
fn pull_request_filter_selects_triggers() {
  let env = TestEnv::from_fixture("ci.json");

  let matching = descriptors(&env, &["--pull-request", "develop"]);
  assert_eq!(matching.len(), 1);
  assert_eq!(matching[0]["name"], "continuous");

  assert!(descriptors(&env, &["--pull-request", "main"]).is_empty());
}

#[test]
fn text_output_lists_jobs() {
  let env = TestEnv::from_fixture("ci.json");

  env
    .stagehand_cmd()
    .args(["ci", "continuous"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Jobs: 4"))
    .stdout(predicate::str::contains("windows-latest partition 1/2"));
}

#[test]
fn unknown_trigger_name_fails() {
  let env = TestEnv::from_fixture("ci.json");

  env
    .stagehand_cmd()
    .args(["ci", "nightly"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No CI trigger named 'nightly'"));
}
