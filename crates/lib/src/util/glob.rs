//! Path glob matching for artifact contracts and branch patterns.
//!
//! Patterns are `/`-separated and relative. Within a component, `*` matches
//! any run of characters and `?` matches exactly one. A component that is
//! exactly `**` matches zero or more whole components.
//!
//! ```
//! use stagehand_lib::util::glob::Pattern;
//!
//! let pattern = Pattern::new("Coverage/**/*.xml");
//! assert!(pattern.matches("Coverage/Parser.Tests/cov.xml"));
//! assert!(pattern.matches("Coverage/cov.xml"));
//! assert!(!pattern.matches("Output/cov.xml"));
//! ```

use std::fmt;
use std::path::PathBuf;

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
  raw: String,
  components: Vec<String>,
}

impl Pattern {
  /// Compile a pattern. Backslashes are treated as separators so patterns
  /// written on Windows behave the same.
  pub fn new(pattern: &str) -> Self {
    let normalized = pattern.replace('\\', "/");
    let components = normalized
      .split('/')
      .filter(|c| !c.is_empty() && *c != ".")
      .map(str::to_string)
      .collect();

    Self {
      raw: pattern.to_string(),
      components,
    }
  }

  /// The pattern as written.
  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// The components joined with `/`, without `.` or empty segments.
  pub fn normalized(&self) -> String {
    self.components.join("/")
  }

  /// Whether the pattern contains any wildcard.
  pub fn is_literal(&self) -> bool {
    self.components.iter().all(|c| !has_wildcard(c))
  }

  /// Leading components that contain no wildcard, joined as a path.
  ///
  /// Walking the filesystem can start here instead of at the root.
  pub fn literal_prefix(&self) -> PathBuf {
    self.components.iter().take_while(|c| !has_wildcard(c)).collect()
  }

  /// Match a relative, `/`-separated path against the pattern.
  pub fn matches(&self, path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let parts: Vec<&str> = normalized.split('/').filter(|c| !c.is_empty() && *c != ".").collect();
    let pattern: Vec<&str> = self.components.iter().map(String::as_str).collect();
    match_components(&pattern, &parts)
  }
}

impl fmt::Display for Pattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

/// Convenience wrapper for one-off matches.
pub fn matches(pattern: &str, path: &str) -> bool {
  Pattern::new(pattern).matches(path)
}

fn has_wildcard(component: &str) -> bool {
  component.contains(['*', '?'])
}

fn match_components(pattern: &[&str], path: &[&str]) -> bool {
  match pattern.split_first() {
    None => path.is_empty(),
    Some((&"**", rest)) => (0..=path.len()).any(|skip| match_components(rest, &path[skip..])),
    Some((head, rest)) => match path.split_first() {
      Some((first, remaining)) => match_component(head, first) && match_components(rest, remaining),
      None => false,
    },
  }
}

fn match_component(pattern: &str, text: &str) -> bool {
  let pattern: Vec<char> = pattern.chars().collect();
  let text: Vec<char> = text.chars().collect();

  // Iterative wildcard match with single-star backtracking.
  let (mut p, mut t) = (0, 0);
  let mut star: Option<(usize, usize)> = None;

  while t < text.len() {
    if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
      p += 1;
      t += 1;
    } else if p < pattern.len() && pattern[p] == '*' {
      star = Some((p, t));
      p += 1;
    } else if let Some((star_p, star_t)) = star {
      p = star_p + 1;
      t = star_t + 1;
      star = Some((star_p, star_t + 1));
    } else {
      return false;
    }
  }

  pattern[p..].iter().all(|c| *c == '*')
}
