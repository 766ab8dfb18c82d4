// src/watch/patterns.rs

use std::fmt;

use regex::Regex;
use tracing::{debug, warn};

/// Pattern substituted when no include pattern is configured.
const MATCH_ALL: &str = ".*";

/// Compiled include/exclude regular expressions.
///
/// Patterns are matched against entry *names* (the last path component),
/// e.g. `"main.rs"` or `"temp.txt"`, so both engines see the same input.
///
/// Semantics:
/// - An empty include list behaves as "match everything".
/// - Exclude is only consulted after an include match, and a match there
///   always wins.
#[derive(Clone)]
pub struct PatternSet {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let include: Vec<&str> = self.include.iter().map(Regex::as_str).collect();
        let exclude: Vec<&str> = self.exclude.iter().map(Regex::as_str).collect();
        f.debug_struct("PatternSet")
            .field("include", &include)
            .field("exclude", &exclude)
            .finish()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::compile::<&str>(&[], &[])
    }
}

impl PatternSet {
    /// Compile both pattern lists.
    ///
    /// Invalid patterns are dropped individually with a warning; the rest of
    /// the list still compiles. If the include list is empty, a match-all
    /// pattern is used instead.
    pub fn compile<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Self {
        let include = if include.is_empty() {
            compile_list(&[MATCH_ALL])
        } else {
            compile_list(include)
        };
        let exclude = compile_list(exclude);

        debug!(
            include = include.len(),
            exclude = exclude.len(),
            "compiled watch patterns"
        );

        Self { include, exclude }
    }

    /// Number of include patterns that compiled (including the implicit
    /// match-all one).
    pub fn include_len(&self) -> usize {
        self.include.len()
    }

    /// Number of exclude patterns that compiled.
    pub fn exclude_len(&self) -> usize {
        self.exclude.len()
    }

    /// Returns true if `name` matches at least one include pattern and no
    /// exclude pattern.
    pub fn matches(&self, name: &str) -> bool {
        if !self.include.iter().any(|re| re.is_match(name)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(name))
    }
}

fn compile_list<S: AsRef<str>>(patterns: &[S]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pat| {
            let pat = pat.as_ref();
            match Regex::new(pat) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %pat, error = %e, "invalid pattern; ignoring");
                    None
                }
            }
        })
        .collect()
}
