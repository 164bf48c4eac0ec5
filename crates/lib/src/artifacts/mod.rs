//! Artifact contracts.
//!
//! Producers declare the globs they write (`produces`), consumers declare which
//! producers they read from (`consumes`). The tracker answers whether a
//! consumer's inputs already exist and checks that the declarations line up.

mod query;

pub use query::{FileQuery, FsQuery};

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::graph::TargetGraph;
use crate::target::Consume;
use crate::util::glob::Pattern;

/// Why a consume entry does not line up with its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
  /// The producer declares no outputs at all.
  NoDeclaredOutputs,
  /// The consumer's glob is not covered by any of the producer's globs.
  UncoveredGlob,
  /// Nothing on disk matches the glob.
  NoMatchingFiles,
}

/// A non-fatal inconsistency between a consumer and its producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractMismatchWarning {
  pub consumer: String,
  pub producer: String,
  pub glob: Option<String>,
  pub kind: MismatchKind,
}

impl fmt::Display for ContractMismatchWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      MismatchKind::NoDeclaredOutputs => write!(
        f,
        "'{}' consumes '{}', which declares no outputs",
        self.consumer, self.producer
      ),
      MismatchKind::UncoveredGlob => write!(
        f,
        "'{}' consumes '{}' from '{}', which no declared output covers",
        self.consumer,
        self.glob.as_deref().unwrap_or_default(),
        self.producer
      ),
      MismatchKind::NoMatchingFiles => write!(
        f,
        "no files match '{}' produced by '{}' for '{}'",
        self.glob.as_deref().unwrap_or_default(),
        self.producer,
        self.consumer
      ),
    }
  }
}

/// Answers artifact questions for the targets of one graph.
pub struct ArtifactTracker<'a> {
  graph: &'a TargetGraph,
  query: &'a dyn FileQuery,
}

impl<'a> ArtifactTracker<'a> {
  pub fn new(graph: &'a TargetGraph, query: &'a dyn FileQuery) -> Self {
    Self { graph, query }
  }

  /// Globs a consume entry resolves to: its own glob, else everything the
  /// producer declares.
  pub fn globs_for(&self, consume: &Consume) -> Vec<String> {
    match &consume.glob {
      Some(glob) => vec![glob.clone()],
      None => self
        .graph
        .get(&consume.target)
        .map(|p| p.produces().to_vec())
        .unwrap_or_default(),
    }
  }

  /// Whether every glob of `consume` matches at least one existing path.
  ///
  /// A consume that resolves to no globs is never satisfied.
  pub fn is_satisfied(&self, consumer: &str, consume: &Consume) -> bool {
    let globs = self.globs_for(consume);
    let satisfied = !globs.is_empty() && globs.iter().all(|g| self.query.any_match(g));
    trace!(consumer = %consumer, producer = %consume.target, satisfied, "checked consumed artifacts");
    satisfied
  }

  /// Whether the target's consumes are non-empty and all satisfied.
  pub fn consumes_satisfied(&self, consumer: &str) -> bool {
    let Some(target) = self.graph.get(consumer) else {
      return false;
    };
    !target.consumes().is_empty() && target.consumes().iter().all(|c| self.is_satisfied(consumer, c))
  }

  /// Compare every consume entry against its producer's declarations.
  ///
  /// With `inspect_files`, globs that match nothing on disk are reported too.
  pub fn check_contracts(&self, inspect_files: bool) -> Vec<ContractMismatchWarning> {
    let mut warnings = Vec::new();

    for consumer in self.graph.iter() {
      for consume in consumer.consumes() {
        let Some(producer) = self.graph.get(&consume.target) else {
          continue;
        };
        let warn = |glob: Option<String>, kind| ContractMismatchWarning {
          consumer: consumer.name().to_string(),
          producer: producer.name().to_string(),
          glob,
          kind,
        };

        if producer.produces().is_empty() {
          warnings.push(warn(consume.glob.clone(), MismatchKind::NoDeclaredOutputs));
          continue;
        }

        if let Some(glob) = &consume.glob
          && !producer.produces().iter().any(|p| covers(p, glob))
        {
          warnings.push(warn(Some(glob.clone()), MismatchKind::UncoveredGlob));
        }

        if inspect_files {
          for glob in self.globs_for(consume) {
            if !self.query.any_match(&glob) {
              warnings.push(warn(Some(glob), MismatchKind::NoMatchingFiles));
            }
          }
        }
      }
    }

    debug!(warnings = warnings.len(), inspect_files, "checked artifact contracts");
    warnings
  }
}

/// Whether the producer glob matches everything the consumer glob can.
///
/// Approximated by matching the consumer glob text as if it were a path, so
/// `Coverage/**/*.xml` covers `Coverage/*.xml` but not `Coverage/*`.
fn covers(producer: &str, consumer: &str) -> bool {
  let producer = Pattern::new(producer);
  let consumer = Pattern::new(consumer);
  producer.as_str() == consumer.as_str() || producer.matches(consumer.as_str())
}
