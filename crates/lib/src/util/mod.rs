//! Shared utilities.
//!
//! Glob matching used by artifact contracts and branch predicates, plus test
//! helpers.

pub mod glob;

#[cfg(test)]
pub mod testutil;
