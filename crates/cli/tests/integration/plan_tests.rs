//! Plan command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn plan_lists_the_schedule_in_order() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("Plan for 'Pack' (5 target(s))"))
    .stdout(predicate::str::contains("1. Clean"))
    .stdout(predicate::str::contains("5. Pack"));

  assert!(env.log().is_empty());
}

#[test]
fn plan_shows_triggered_targets() {
  let env = TestEnv::from_fixture("triggers.json");

  env
    .stagehand_cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("Coverage (on success)"));
}

#[test]
fn plan_json_output() {
  let env = TestEnv::from_fixture("linear.json");

  let output = env
    .stagehand_cmd()
    .args(["plan", "Compile", "--target", "Docs", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
  let names: Vec<&str> = plan["schedule"]
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["name"].as_str().unwrap())
    .collect();
  assert_eq!(names, vec!["Clean", "Restore", "Compile", "Docs"]);
}

#[test]
fn cyclic_pipeline_is_rejected() {
  let env = TestEnv::from_fixture("cyclic.json");

  env
    .stagehand_cmd()
    .arg("plan")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cyclic dependency"));
}
