//! Placeholder parsing and substitution for manifest commands.
//!
//! Commands declared in a pipeline manifest reference run values that are only
//! known when the target executes. This module parses those references and
//! substitutes resolved values.
//!
//! # Placeholder Formats
//!
//! - `$${configuration}`, `$${target}`, `$${partition}`, `$${api_key}`,
//!   `$${ignore_failed_sources}` - run parameters
//! - `$${item}` - the current work item (the command then runs once per item)
//! - `$${item_name}` - file stem of the current work item
//! - `$${dir:NAME}` - a conventional artifact directory (`root`, `output`,
//!   `packages`, `coverage`, `coverage_report`, `source`, `tests`)
//! - `$${partition_dir:NAME}` - the same directory scoped to the active
//!   partition, e.g. `Coverage/partition-2-of-3`
//! - `$${scheduled:TARGET}` - `true` when TARGET is part of this run
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so shell variables like
//! `$HOME` and `$PATH` work naturally without any escaping.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use stagehand_lib::placeholder::{parse, Segment, Placeholder};
//!
//! let segments = parse("dotnet test $${item} -c $${configuration}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("dotnet test ".to_string()),
//!     Segment::Placeholder(Placeholder::Item),
//!     Segment::Literal(" -c ".to_string()),
//!     Segment::Placeholder(Placeholder::Param("configuration".to_string())),
//! ]);
//! ```

use std::path::Path;

use thiserror::Error;

/// Run parameters addressable with a bare `$${name}`.
pub const PARAMS: &[&str] = &["configuration", "target", "partition", "api_key", "ignore_failed_sources"];

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${configuration}` and the other entries of [`PARAMS`]
  Param(String),

  /// `$${item}` - the current work item
  Item,

  /// `$${item_name}` - file stem of the current work item
  ItemName,

  /// `$${dir:NAME}` - an artifact directory
  Dir(String),

  /// `$${partition_dir:NAME}` - an artifact directory owned by one partition
  PartitionDir(String),

  /// `$${scheduled:TARGET}` - whether TARGET is scheduled in this run
  Scheduled(String),
}

impl Placeholder {
  /// Whether the placeholder refers to the current work item.
  pub fn is_item(&self) -> bool {
    matches!(self, Placeholder::Item | Placeholder::ItemName)
  }
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder: {0}")]
  Unknown(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("no work item available for '$${{{0}}}'")]
  NoItem(String),

  #[error("unresolved parameter: {0}")]
  UnresolvedParam(String),

  #[error("unknown directory: {0}")]
  UnknownDir(String),

  #[error("unknown target: {0}")]
  UnknownTarget(String),
}

/// Trait for resolving placeholder values during execution.
pub trait Resolver {
  /// Resolve a run parameter by name.
  fn resolve_param(&self, name: &str) -> Result<String, PlaceholderError>;

  /// The work item the command is being expanded for, if any.
  fn resolve_item(&self) -> Option<&str>;

  /// Resolve a named artifact directory.
  fn resolve_dir(&self, name: &str) -> Result<String, PlaceholderError>;

  /// Resolve a named artifact directory for the active partition.
  fn resolve_partition_dir(&self, name: &str) -> Result<String, PlaceholderError>;

  /// Whether a target is part of the run's schedule.
  fn resolve_scheduled(&self, target: &str) -> bool;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed (unclosed, unknown name, etc.)
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();

        match chars.peek() {
          Some((_, '$')) => {
            chars.next();

            match chars.peek() {
              Some((_, '{')) => {
                // Escaped: $$${ -> $${ (literal)
                literal.push_str("$${");
                chars.next();
              }
              _ => literal.push_str("$$$"),
            }
          }
          Some((_, '{')) => {
            chars.next();

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut content = String::new();
            let mut found_close = false;
            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              content.push(c);
            }

            if !found_close {
              return Err(PlaceholderError::Unclosed(pos));
            }

            segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      // A lone $ is a shell variable.
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside a placeholder (everything between `$${` and `}`).
fn parse_placeholder_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  let content = content.trim();

  let Some((kind, rest)) = content.split_once(':') else {
    return match content {
      "item" => Ok(Placeholder::Item),
      "item_name" => Ok(Placeholder::ItemName),
      "" => Err(PlaceholderError::Malformed("empty placeholder".to_string())),
      name if PARAMS.contains(&name) => Ok(Placeholder::Param(name.to_string())),
      other => Err(PlaceholderError::Unknown(other.to_string())),
    };
  };

  if rest.is_empty() {
    return Err(PlaceholderError::Malformed(format!("missing argument in '{content}'")));
  }

  match kind {
    "dir" => Ok(Placeholder::Dir(rest.to_string())),
    "partition_dir" => Ok(Placeholder::PartitionDir(rest.to_string())),
    "scheduled" => Ok(Placeholder::Scheduled(rest.to_string())),
    _ => Err(PlaceholderError::Unknown(kind.to_string())),
  }
}

/// Whether any segment refers to the current work item.
pub fn references_item(segments: &[Segment]) -> bool {
  segments
    .iter()
    .any(|s| matches!(s, Segment::Placeholder(p) if p.is_item()))
}

/// Target names referenced through `$${scheduled:TARGET}`.
pub fn scheduled_targets(segments: &[Segment]) -> impl Iterator<Item = &str> {
  segments.iter().filter_map(|s| match s {
    Segment::Placeholder(Placeholder::Scheduled(target)) => Some(target.as_str()),
    _ => None,
  })
}

/// Substitute all placeholders in a string using the provided resolver.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
///
/// Use this when the same command is expanded once per work item.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => {
        let value = match p {
          Placeholder::Param(name) => resolver.resolve_param(name)?,
          Placeholder::Item => resolver
            .resolve_item()
            .ok_or_else(|| PlaceholderError::NoItem("item".to_string()))?
            .to_string(),
          Placeholder::ItemName => {
            let item = resolver
              .resolve_item()
              .ok_or_else(|| PlaceholderError::NoItem("item_name".to_string()))?;
            Path::new(item)
              .file_stem()
              .map(|s| s.to_string_lossy().to_string())
              .unwrap_or_else(|| item.to_string())
          }
          Placeholder::Dir(name) => resolver.resolve_dir(name)?,
          Placeholder::PartitionDir(name) => resolver.resolve_partition_dir(name)?,
          Placeholder::Scheduled(target) => resolver.resolve_scheduled(target).to_string(),
        };
        result.push_str(&value);
      }
    }
  }

  Ok(result)
}
