//! stagehand-lib: the target-graph engine behind stagehand
//!
//! This crate provides the pieces a build pipeline is made of:
//! - `Target`: a named unit of work with dependencies, triggers,
//!   preconditions, partitioning, an artifact contract and a body
//! - `TargetGraph`: the validated set of targets and their edges
//! - `Scheduler`: runs the closure of a goal in dependency order
//! - `PipelineManifest`: the JSON declaration of a pipeline

pub mod artifacts;
pub mod ci;
pub mod config;
pub mod consts;
pub mod context;
pub mod execute;
pub mod graph;
pub mod layout;
pub mod manifest;
pub mod partition;
pub mod placeholder;
pub mod requires;
pub mod target;
pub mod util;

pub use config::RunConfig;
pub use context::RunContext;
pub use execute::{RunReport, RunRequest, Scheduler};
pub use graph::TargetGraph;
pub use manifest::PipelineManifest;
pub use target::Target;
