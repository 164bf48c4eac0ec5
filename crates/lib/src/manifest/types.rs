//! Manifest types for stagehand.
//!
//! The manifest declares a pipeline as data: every target with its edges,
//! preconditions, partitioning, artifact contract, failure policy and the
//! commands that make up its body, plus the CI triggers.
//!
//! # Example
//!
//! ```json
//! {
//!   "default_target": "Pack",
//!   "targets": [
//!     { "name": "Compile", "commands": ["dotnet build -c $${configuration}"] },
//!     {
//!       "name": "Test",
//!       "depends_on": ["Compile"],
//!       "partitions": 2,
//!       "work_glob": "Tests/**/*.csproj",
//!       "produces": ["Coverage/**/*.xml"],
//!       "commands": ["dotnet test $${item} --no-build"]
//!     },
//!     {
//!       "name": "Publish",
//!       "depends_on": ["Pack"],
//!       "consumes": ["Pack"],
//!       "proceed_after_failure": true,
//!       "requires": [
//!         { "kind": "env", "var": "STAGEHAND_API_KEY" },
//!         { "kind": "branch", "patterns": ["main", "release/*"] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::ci::CiTrigger;
use crate::config::{ConfigError, Configuration};
use crate::execute::command::CommandSpec;
use crate::requires::Requirement;
use crate::target::Consume;

/// A whole pipeline as declared in `stagehand.json`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineManifest {
  /// Goal used when `run` is given none.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_target: Option<String>,

  #[serde(default)]
  pub targets: Vec<TargetDecl>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ci: Vec<CiTrigger>,
}

/// One target declaration. Order in the manifest is registration order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetDecl {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub depends_on: Vec<String>,
  pub triggered_by: Vec<String>,
  pub after: Vec<String>,
  pub requires: Vec<RequirementDecl>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub partitions: Option<usize>,
  /// Literal work items, in order.
  pub work: Vec<String>,
  /// Glob resolved against the root at load time; matches follow `work`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub work_glob: Option<String>,
  pub produces: Vec<String>,
  pub consumes: Vec<ConsumeDecl>,
  pub proceed_after_failure: bool,
  pub tolerates_failed_dependencies: bool,
  pub commands: Vec<CommandDecl>,
}

/// `"Pack"` or `{ "target": "Test", "glob": "Coverage/*.xml" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsumeDecl {
  Target(String),
  Glob {
    target: String,
    #[serde(default)]
    glob: Option<String>,
  },
}

impl From<&ConsumeDecl> for Consume {
  fn from(decl: &ConsumeDecl) -> Self {
    match decl {
      ConsumeDecl::Target(target) => Consume {
        target: target.clone(),
        glob: None,
      },
      ConsumeDecl::Glob { target, glob } => Consume {
        target: target.clone(),
        glob: glob.clone(),
      },
    }
  }
}

/// A declarative precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequirementDecl {
  /// The variable is set to a non-blank value.
  Env {
    var: String,
    #[serde(default)]
    description: Option<String>,
  },
  /// The run uses the named configuration.
  Configuration {
    name: String,
    #[serde(default)]
    description: Option<String>,
  },
  /// The current branch matches one of the patterns.
  Branch {
    patterns: Vec<String>,
    #[serde(default)]
    description: Option<String>,
  },
  /// No uncommitted changes.
  CleanWorkingCopy {
    #[serde(default)]
    description: Option<String>,
  },
}

impl RequirementDecl {
  pub fn to_requirement(&self) -> Result<Requirement, ConfigError> {
    let (requirement, description) = match self {
      RequirementDecl::Env { var, description } => (Requirement::env_set(var.clone()), description),
      RequirementDecl::Configuration { name, description } => {
        (Requirement::configuration(name.parse::<Configuration>()?), description)
      }
      RequirementDecl::Branch { patterns, description } => (Requirement::branch(patterns.clone()), description),
      RequirementDecl::CleanWorkingCopy { description } => (Requirement::clean_working_copy(), description),
    };
    Ok(match description {
      Some(description) => requirement.describe(description.clone()),
      None => requirement,
    })
  }

  /// Whether the predicate needs facts about the git repository.
  pub fn needs_repository(&self) -> bool {
    matches!(self, RequirementDecl::Branch { .. } | RequirementDecl::CleanWorkingCopy { .. })
  }
}

/// `"dotnet build"` or `{ "cmd": "...", "env": {...}, "cwd": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandDecl {
  Line(String),
  Full(CommandSpec),
}

impl CommandDecl {
  pub fn to_spec(&self) -> CommandSpec {
    match self {
      CommandDecl::Line(cmd) => CommandSpec::new(cmd.clone()),
      CommandDecl::Full(spec) => spec.clone(),
    }
  }
}
