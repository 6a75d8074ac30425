//! Path-based CI skipping.

use std::fmt::Display;

use crate::effects::{GitHubInterpreter, IndexInterpreter};
use crate::rules::Rule;
use crate::types::ChangedFile;

use super::calls;
use super::context::EventContext;
use super::error::EngineError;
use super::paths::PathRules;
use super::reuse::{DIFF_FILE_LIMIT, find_green_build};

/// PRs touching at least this many files always run CI.
pub const MAX_SKIPPABLE_CHANGED_FILES: u64 = 1000;

/// Whether the diff since the last green build should decide, rather than
/// the whole PR diff.
fn smart_skip_enabled(rule: &Rule, ctx: &EventContext) -> bool {
    rule.enable_skippable_commits
        && rule
            .skippable_commits_label
            .as_ref()
            .is_none_or(|label| ctx.pull_request.has_label(label))
}

/// Decides whether CI can be skipped for a create or update event.
///
/// Errors are never fatal: a failed lookup means CI runs.
pub async fn should_skip_ci<G, I>(github: &G, index: &I, rule: &Rule, ctx: &EventContext) -> bool
where
    G: GitHubInterpreter,
    G::Error: Display,
    I: IndexInterpreter,
    I::Error: Display,
{
    if !ctx.trigger.is_commit_event() || rule.skip_ci_on_only_changed.is_empty() {
        return false;
    }

    if ctx.pull_request.changed_files >= MAX_SKIPPABLE_CHANGED_FILES {
        return false;
    }

    let paths = match PathRules::compile(
        &rule.skip_ci_on_only_changed,
        &rule.always_require_ci_on_changed,
    ) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::error!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Invalid skip pattern"
            );
            return false;
        }
    };

    if smart_skip_enabled(rule, ctx) {
        match diff_since_green_build(github, index, rule, ctx).await {
            Ok(Some(files)) if files.len() < DIFF_FILE_LIMIT => {
                let skippable = paths.is_skippable(&files);
                tracing::debug!(
                    repo = %ctx.repo,
                    pr = %ctx.pull_request.number,
                    pipeline = %rule.pipeline_slug,
                    files = files.len(),
                    skippable,
                    "Evaluated diff since last green build"
                );
                return skippable;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    pr = %ctx.pull_request.number,
                    pipeline = %rule.pipeline_slug,
                    error = %e,
                    "Failed to diff against last green build"
                );
            }
        }
    }

    match calls::list_pr_files(github, &ctx.repo, ctx.pull_request.number).await {
        Ok(files) => paths.is_skippable(&files),
        Err(e) => {
            tracing::warn!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Failed to list PR files"
            );
            false
        }
    }
}

/// Files changed between the rule's last green build and the PR head.
async fn diff_since_green_build<G, I>(
    github: &G,
    index: &I,
    rule: &Rule,
    ctx: &EventContext,
) -> Result<Option<Vec<ChangedFile>>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
    I: IndexInterpreter,
    I::Error: Display,
{
    let slugs = [rule.pipeline_slug.clone()];
    let Some(build) = find_green_build(github, index, ctx, &slugs).await? else {
        return Ok(None);
    };

    let files =
        calls::compare_commits(github, &ctx.repo, &build.commit, &ctx.pull_request.head.sha)
            .await?;
    Ok(Some(files))
}
