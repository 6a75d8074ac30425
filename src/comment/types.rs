//! Types produced by the comment parser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The result of matching one comment against one trigger pattern.
///
/// `matched` and `groups` are both `None` when the pattern did not match;
/// that is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedComment {
    /// The text the pattern was matched against: the trimmed first line, or
    /// the whole body when the flags ask for multi-line semantics.
    pub comment: String,

    /// The literal substring that matched the pattern.
    pub matched: Option<String>,

    /// Named capture groups that participated in the match.
    pub groups: Option<BTreeMap<String, String>>,
}

impl ParsedComment {
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

/// Regex flags in the single-letter form used by rule files (`"im"`, `"s"`).
///
/// Letters other than `i`, `m` and `s` are accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_all: bool,
}

impl PatternFlags {
    /// Flags used when a rule does not specify any.
    pub const DEFAULT: Self = Self {
        case_insensitive: true,
        multi_line: false,
        dot_all: false,
    };

    /// Parses a flag string. `None` yields [`PatternFlags::DEFAULT`]; a
    /// supplied string replaces the defaults entirely.
    pub fn parse(flags: Option<&str>) -> Self {
        match flags {
            None => Self::DEFAULT,
            Some(flags) => Self {
                case_insensitive: flags.contains('i'),
                multi_line: flags.contains('m'),
                dot_all: flags.contains('s'),
            },
        }
    }

    /// Whether the whole comment body should be matched instead of its first line.
    pub fn matches_full_body(&self) -> bool {
        self.multi_line || self.dot_all
    }
}

impl Default for PatternFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}
