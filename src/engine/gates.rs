//! Synchronous trigger gates.
//!
//! Strict requirements apply to every trigger. The general trigger and the
//! always-trigger override decide whether the event is one the rule reacts
//! to; either one is enough.

use crate::comment::{PatternFlags, compile_pattern, parse_with};
use crate::rules::Rule;

use super::context::{EventContext, TriggerType};
use super::error::EngineError;

/// Which gate made a rule eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPath {
    General,
    AlwaysTrigger,
}

/// Checks that hold no matter how the event was triggered.
///
/// Skip-CI labels are ignored for comment events so a trigger phrase can
/// still start a build on a PR labeled to skip CI.
pub fn check_strict_requirements(rule: &Rule, ctx: &EventContext) -> bool {
    if !rule.enabled {
        return false;
    }

    let base = &ctx.pull_request.base.ref_name;

    if !rule.target_branches.is_empty() && !rule.target_branches.contains(base) {
        return false;
    }

    if rule.skip_target_branches.contains(base) {
        return false;
    }

    if !ctx.is_comment() && ctx.pull_request.has_any_label(&rule.skip_ci_labels) {
        tracing::info!(
            repo = %ctx.repo,
            pr = %ctx.pull_request.number,
            pipeline = %rule.pipeline_slug,
            "Skipping because a skip-ci label is present"
        );
        return false;
    }

    true
}

/// The ordinary trigger: required labels, then the event-specific condition.
///
/// On a comment match the parsed comment is attached to `ctx`.
pub fn check_general_trigger(rule: &Rule, ctx: &mut EventContext) -> Result<bool, EngineError> {
    if !rule.labels.is_empty() && !ctx.pull_request.has_any_label(&rule.labels) {
        return Ok(false);
    }

    match ctx.trigger {
        TriggerType::Label => Ok(ctx
            .label
            .as_ref()
            .is_some_and(|label| rule.labels.contains(label))),
        TriggerType::Comment => {
            if ctx.comment.is_none()
                || !rule.build_on_comment
                || rule.trigger_comment_regex.is_empty()
            {
                return Ok(false);
            }
            parse_and_set_comment(
                ctx,
                &rule.trigger_comment_regex,
                rule.trigger_comment_regex_flags.as_deref(),
            )
        }
        TriggerType::Create | TriggerType::Update => Ok(rule.build_on_commit),
    }
}

/// The override phrase, which bypasses required labels and `build_on_comment`.
pub fn check_always_trigger(rule: &Rule, ctx: &mut EventContext) -> Result<bool, EngineError> {
    if ctx.comment.is_none() || rule.always_trigger_comment_regex.is_empty() {
        return Ok(false);
    }
    parse_and_set_comment(
        ctx,
        &rule.always_trigger_comment_regex,
        rule.always_trigger_comment_regex_flags.as_deref(),
    )
}

/// Runs the general trigger and, only if it fails, the always-trigger override.
pub fn evaluate_trigger(
    rule: &Rule,
    ctx: &mut EventContext,
) -> Result<Option<TriggerPath>, EngineError> {
    if check_general_trigger(rule, ctx)? {
        return Ok(Some(TriggerPath::General));
    }
    if check_always_trigger(rule, ctx)? {
        return Ok(Some(TriggerPath::AlwaysTrigger));
    }
    Ok(None)
}

fn parse_and_set_comment(
    ctx: &mut EventContext,
    pattern: &str,
    flags: Option<&str>,
) -> Result<bool, EngineError> {
    let Some(comment) = &ctx.comment else {
        return Ok(false);
    };

    let flags = PatternFlags::parse(flags);
    let regex = compile_pattern(pattern, flags).map_err(|source| EngineError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let parsed = parse_with(&regex, flags, &comment.body);
    if parsed.is_match() {
        ctx.parsed_comment = Some(parsed);
        return Ok(true);
    }
    Ok(false)
}
