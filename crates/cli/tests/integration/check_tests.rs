//! Check command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn check_reports_contract_mismatches() {
  let env = TestEnv::from_fixture("contracts.json");

  env
    .stagehand_cmd()
    .arg("check")
    .assert()
    .success()
    .stdout(predicate::str::contains("with 2 warning(s)"))
    .stderr(predicate::str::contains("which no declared output covers"))
    .stderr(predicate::str::contains("which declares no outputs"));
}

#[test]
fn inspect_files_reports_missing_artifacts() {
  let env = TestEnv::from_fixture("contracts.json");

  env
    .stagehand_cmd()
    .args(["check", "--inspect-files"])
    .assert()
    .success()
    .stderr(predicate::str::contains("no files match 'Output/packages/*.nupkg'"));

  env.write_file("Output/packages/Parser.1.0.0.nupkg", "");

  env
    .stagehand_cmd()
    .args(["check", "--inspect-files"])
    .assert()
    .success()
    .stderr(predicate::str::contains("Output/packages").not());
}

#[test]
fn check_json_output() {
  let env = TestEnv::from_fixture("contracts.json");

  let output = env
    .stagehand_cmd()
    .args(["check", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let check: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(check["targets"], 5);
  let kinds: Vec<&str> = check["warnings"]
    .as_array()
    .unwrap()
    .iter()
    .map(|w| w["kind"].as_str().unwrap())
    .collect();
  assert_eq!(kinds, vec!["uncovered_glob", "no_declared_outputs"]);
}

#[test]
fn list_describes_targets() {
  let env = TestEnv::from_fixture("linear.json");

  env
    .stagehand_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("remove build output"))
    .stdout(predicate::str::contains("Targets: 6"));
}
