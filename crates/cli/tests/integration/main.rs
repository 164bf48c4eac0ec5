//! Integration tests that run the stagehand binary against fixture pipelines.

mod common;

mod check_tests;
mod ci_tests;
mod plan_tests;
mod run_tests;
