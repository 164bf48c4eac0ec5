//! Deterministic work partitioning.
//!
//! A partitioned target splits its work collection into `P` shards so that an
//! external orchestrator (usually a CI matrix) can run one shard per process.
//! Items are dealt round-robin: `item[k]` belongs to partition `k mod P`.
//! Every item lands in exactly one partition, partition sizes differ by at
//! most one, and the result only depends on the input order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while selecting a partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
  /// The index lies outside `[0, count)`.
  #[error("invalid partition index {index} for {count} partition(s)")]
  InvalidIndex { index: i64, count: usize },

  /// A partition count of zero.
  #[error("partition count must be positive")]
  InvalidCount,

  /// The configured selection was made for a different number of partitions.
  #[error("partition {selection} does not fit a target declaring {declared} partition(s)")]
  CountMismatch {
    selection: PartitionSelection,
    declared: usize,
  },

  /// A selection string that is not `INDEX/COUNT`.
  #[error("malformed partition selection '{0}': expected INDEX/COUNT")]
  Malformed(String),
}

/// The active partition of a run: a zero-based index out of `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionSelection {
  pub index: usize,
  pub count: usize,
}

impl PartitionSelection {
  /// Validate and build a selection.
  pub fn new(index: i64, count: usize) -> Result<Self, PartitionError> {
    if count == 0 {
      return Err(PartitionError::InvalidCount);
    }
    let index = usize::try_from(index)
      .ok()
      .filter(|i| *i < count)
      .ok_or(PartitionError::InvalidIndex { index, count })?;
    Ok(Self { index, count })
  }

  /// The whole collection as one partition.
  pub fn single() -> Self {
    Self { index: 0, count: 1 }
  }

  /// Resolve the selection a target declaring `declared` partitions runs with.
  ///
  /// Without a configured selection the whole collection runs.
  pub fn resolve(configured: Option<PartitionSelection>, declared: usize) -> Result<Self, PartitionError> {
    if declared == 0 {
      return Err(PartitionError::InvalidCount);
    }
    match configured {
      None => Ok(Self::single()),
      Some(selection) if selection.index >= declared => Err(PartitionError::InvalidIndex {
        index: selection.index as i64,
        count: declared,
      }),
      Some(selection) if selection.count != declared => Err(PartitionError::CountMismatch { selection, declared }),
      Some(selection) => Ok(selection),
    }
  }

  /// The items of `items` that belong to this partition, in input order.
  pub fn select<T: Clone>(&self, items: &[T]) -> Vec<T> {
    items
      .iter()
      .enumerate()
      .filter(|(k, _)| k % self.count == self.index)
      .map(|(_, item)| item.clone())
      .collect()
  }
}

impl fmt::Display for PartitionSelection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.index, self.count)
  }
}

impl FromStr for PartitionSelection {
  type Err = PartitionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (index, count) = s
      .trim()
      .split_once('/')
      .ok_or_else(|| PartitionError::Malformed(s.to_string()))?;
    let index = index
      .trim()
      .parse::<i64>()
      .map_err(|_| PartitionError::Malformed(s.to_string()))?;
    let count = count
      .trim()
      .parse::<usize>()
      .map_err(|_| PartitionError::Malformed(s.to_string()))?;
    Self::new(index, count)
  }
}

/// Assign `items` to partition `index` out of `count`.
pub fn assign<T: Clone>(items: &[T], count: usize, index: i64) -> Result<Vec<T>, PartitionError> {
  Ok(PartitionSelection::new(index, count)?.select(items))
}
