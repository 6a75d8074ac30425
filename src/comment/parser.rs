//! Matches a free-text PR comment against a rule's trigger pattern.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use super::types::{ParsedComment, PatternFlags};

/// Compiles a rule pattern with the given flags.
pub fn compile_pattern(pattern: &str, flags: PatternFlags) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_all)
        .build()
}

/// Parses a comment against `pattern`.
///
/// Unless `flags` request multi-line or dot-all semantics, only the first
/// line of the comment is considered (trimmed), so a short phrase like
/// `build this` still matches when a quoted reply follows it.
///
/// # Examples
///
/// ```
/// use pr_trigger_bot::comment::parse_comment;
///
/// let parsed = parse_comment(
///     "buildkite deploy (?<product>[a-z]+) to (?<location>[a-z]+)",
///     None,
///     "buildkite deploy Thing to Place\n> quoted reply",
/// )
/// .unwrap();
///
/// assert_eq!(parsed.matched.as_deref(), Some("buildkite deploy Thing to Place"));
/// assert_eq!(parsed.groups.unwrap()["product"], "Thing");
/// ```
pub fn parse_comment(
    pattern: &str,
    flags: Option<&str>,
    body: &str,
) -> Result<ParsedComment, regex::Error> {
    let flags = PatternFlags::parse(flags);
    let regex = compile_pattern(pattern, flags)?;
    Ok(parse_with(&regex, flags, body))
}

/// Parses a comment against an already-compiled pattern.
pub fn parse_with(regex: &Regex, flags: PatternFlags, body: &str) -> ParsedComment {
    let comment = normalize(body, flags);

    let Some(captures) = regex.captures(&comment) else {
        return ParsedComment {
            comment,
            matched: None,
            groups: None,
        };
    };

    let matched = captures.get(0).map(|m| m.as_str().to_string());

    let groups: BTreeMap<String, String> = regex
        .capture_names()
        .flatten()
        .filter_map(|name| {
            captures
                .name(name)
                .map(|m| (name.to_string(), m.as_str().to_string()))
        })
        .collect();

    ParsedComment {
        matched,
        groups: if regex.capture_names().flatten().next().is_some() {
            Some(groups)
        } else {
            None
        },
        comment,
    }
}

fn normalize(body: &str, flags: PatternFlags) -> String {
    if flags.matches_full_body() {
        body.to_string()
    } else {
        body.split('\n').next().unwrap_or_default().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DEFAULT_TRIGGER: &str = r"^(?:(?:buildkite\W+)?(?:build|test)\W+(?:this|it))|^retest$";

    fn matches(pattern: &str, flags: Option<&str>, body: &str) -> bool {
        parse_comment(pattern, flags, body).unwrap().is_match()
    }

    // ==================== Default trigger phrase ====================

    #[test]
    fn default_pattern_matches_trigger_phrases() {
        let comments = [
            "buildkite test this",
            "buildkite build this",
            "buildkite test this please",
            "BUILDKITE TEST THIS",
            "test this",
            "build this",
            "build it",
            "retest",
            "buildkite test this\nsome extra context",
            "  buildkite test this ",
        ];

        for comment in comments {
            assert!(matches(DEFAULT_TRIGGER, None, comment), "{comment:?} should match");
        }
    }

    #[test]
    fn default_pattern_ignores_other_comments() {
        let comments = [
            "no buildkite test this",
            "yadda\nbuildkite test this",
            "just a normal comment",
            "buildkite",
            "retest please",
            "",
        ];

        for comment in comments {
            assert!(!matches(DEFAULT_TRIGGER, None, comment), "{comment:?} should not match");
        }
    }

    #[test]
    fn normalized_comment_is_trimmed_first_line() {
        let parsed = parse_comment(DEFAULT_TRIGGER, None, "  build this  \r\n> quoted").unwrap();
        assert_eq!(parsed.comment, "build this");
        assert_eq!(parsed.matched.as_deref(), Some("build this"));
    }

    // ==================== Named groups ====================

    #[test]
    fn named_groups_are_extracted() {
        let parsed = parse_comment(
            "buildkite deploy (?<product>[a-z]+) to (?<location>[a-z]+)",
            None,
            "buildkite deploy Thing to Place",
        )
        .unwrap();

        let groups = parsed.groups.unwrap();
        assert_eq!(groups["product"], "Thing");
        assert_eq!(groups["location"], "Place");
    }

    #[test]
    fn optional_group_that_did_not_participate_is_omitted() {
        let parsed = parse_comment(
            "build this(?: on (?<target>\\w+))?",
            None,
            "build this",
        )
        .unwrap();

        assert!(parsed.is_match());
        assert_eq!(parsed.groups, Some(BTreeMap::new()));
    }

    #[test]
    fn no_match_has_no_groups() {
        let parsed = parse_comment("deploy (?<what>\\w+)", None, "hello").unwrap();
        assert_eq!(parsed.matched, None);
        assert_eq!(parsed.groups, None);
        assert_eq!(parsed.comment, "hello");
    }

    // ==================== Flags ====================

    #[test]
    fn multi_line_flag_matches_full_body() {
        let body = "Thanks for the review!\nbuild this";
        assert!(!matches("^build this$", None, body));
        assert!(matches("^build this$", Some("im"), body));
    }

    #[test]
    fn dot_all_flag_matches_full_body() {
        let body = "please\nbuild this";
        assert!(matches("please.build this", Some("s"), body));
    }

    #[test]
    fn full_body_keeps_surrounding_whitespace() {
        let body = "  build this\n";
        let parsed = parse_comment("^build this$", Some("m"), body).unwrap();
        assert_eq!(parsed.comment, body);
        assert!(!parsed.is_match());
        assert!(matches("^  build this$", Some("m"), body));
    }

    #[test]
    fn supplied_flags_disable_case_insensitivity() {
        assert!(matches("^Build This$", None, "build this"));
        assert!(!matches("^Build This$", Some(""), "build this"));
        assert!(matches("^Build This$", Some("i"), "build this"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(parse_comment("build (this", None, "build this").is_err());
    }

    // ==================== Robustness ====================

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(text: String) {
            let _ = parse_comment(DEFAULT_TRIGGER, None, &text);
        }

        #[test]
        fn trailing_lines_never_affect_single_line_match(
            first in "(build|test) (this|it)",
            rest in "[^\n]{0,40}"
        ) {
            let body = format!("{first}\n{rest}");
            prop_assert!(matches(DEFAULT_TRIGGER, None, &body));
        }
    }
}
