//! Comment parsing for comment-triggered builds.
//!
//! Rules carry a trigger pattern (and optionally an always-trigger pattern).
//! A comment on a PR triggers a rule when the pattern matches; named capture
//! groups become build parameters.
//!
//! # Example
//!
//! ```
//! use pr_trigger_bot::comment::parse_comment;
//!
//! let parsed = parse_comment(r"^build (this|it)", None, "Build this please").unwrap();
//! assert!(parsed.is_match());
//!
//! let parsed = parse_comment(r"^build (this|it)", None, "> quoted\nbuild this").unwrap();
//! assert!(!parsed.is_match());
//! ```

mod parser;
mod types;

pub use parser::{compile_pattern, parse_comment, parse_with};
pub use types::{ParsedComment, PatternFlags};
