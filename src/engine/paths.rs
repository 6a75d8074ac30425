//! Changed-path matching.
//!
//! A diff is skippable when every touched path, including the pre-rename
//! path of a renamed file, matches a skip pattern and no touched path matches
//! an always-require pattern.

use regex::RegexSet;

use crate::types::ChangedFile;

/// Compiles a list of path patterns into one set. Patterns are case-sensitive.
pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<RegexSet, regex::Error> {
    RegexSet::new(patterns.iter().map(AsRef::as_ref))
}

/// Returns true iff no path matches `required` and every path matches `skip`.
///
/// An empty `skip` set never skips. An empty file list is vacuously
/// skippable: nothing changed.
pub fn paths_are_fully_skippable(
    files: &[ChangedFile],
    skip: &RegexSet,
    required: &RegexSet,
) -> bool {
    if skip.is_empty() {
        return false;
    }

    let touches_required = files
        .iter()
        .flat_map(|f| f.paths())
        .any(|p| required.is_match(p));

    !touches_required && files.iter().flat_map(|f| f.paths()).all(|p| skip.is_match(p))
}

/// Compiled skip and always-require patterns for one rule.
#[derive(Debug, Clone)]
pub struct PathRules {
    pub skip: RegexSet,
    pub required: RegexSet,
}

impl PathRules {
    pub fn compile<S: AsRef<str>>(skip: &[S], required: &[S]) -> Result<Self, regex::Error> {
        Ok(Self {
            skip: compile_patterns(skip)?,
            required: compile_patterns(required)?,
        })
    }

    pub fn is_skippable(&self, files: &[ChangedFile]) -> bool {
        paths_are_fully_skippable(files, &self.skip, &self.required)
    }
}
