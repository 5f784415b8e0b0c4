//! Compiled pattern sets

use std::collections::HashSet;

use glob::Pattern;

use crate::{FilterError, Result};

/// A set of exact strings and glob patterns
///
/// Exact entries are checked with a hash lookup before globs are tried.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    exact: HashSet<String>,
    globs: Vec<Pattern>,
}

impl PatternSet {
    /// Compile patterns; `class` names the rule class in errors
    pub fn compile(class: &'static str, patterns: &[String]) -> Result<Self> {
        let mut set = Self::default();
        for pattern in patterns {
            if pattern.contains(['*', '?', '[']) {
                let compiled = Pattern::new(pattern)
                    .map_err(|e| FilterError::invalid_pattern(class, pattern, e.msg))?;
                set.globs.push(compiled);
            } else {
                set.exact.insert(pattern.clone());
            }
        }
        Ok(set)
    }

    /// Whether `value` matches any pattern
    pub fn matches(&self, value: &str) -> bool {
        self.exact.contains(value) || self.globs.iter().any(|g| g.matches(value))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.globs.is_empty()
    }
}
