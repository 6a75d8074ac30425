//! Build reuse.
//!
//! Finds a previously passed build whose changes up to the PR head are all
//! in paths that cannot affect build artifacts, so the new CI run can restore
//! that build's artifacts instead of rebuilding.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

use crate::effects::{GitHubInterpreter, IndexInterpreter};
use crate::rules::Rule;
use crate::types::{ReusableBuild, Sha};

use super::calls;
use super::context::EventContext;
use super::error::EngineError;
use super::paths::PathRules;

/// Base-branch commits added to the candidate set.
pub const BASE_COMMITS_COUNT: u8 = 10;

/// PRs with at least this many commits are not searched.
pub const MAX_PR_COMMITS: u64 = 100;

/// The compare API lists at most this many files. A diff reaching it may be
/// truncated and is never treated as skippable.
pub const DIFF_FILE_LIMIT: usize = 300;

/// Merges the PR's commits with up to `base_count` base-branch commits not
/// already present. Returns oldest first with no duplicates.
pub fn commits_for_build_compare(
    pr_oldest_first: &[Sha],
    base_newest_first: &[Sha],
    base_count: usize,
) -> Vec<Sha> {
    let mut seen = HashSet::new();
    let mut newest_first: Vec<Sha> = pr_oldest_first
        .iter()
        .rev()
        .filter(|sha| seen.insert(sha.as_str()))
        .cloned()
        .collect();

    newest_first.extend(
        base_newest_first
            .iter()
            .filter(|sha| seen.insert(sha.as_str()))
            .take(base_count)
            .cloned(),
    );

    newest_first.reverse();
    newest_first
}

/// The most recently created passed build, if any.
pub fn latest_passed(builds: Vec<ReusableBuild>) -> Option<ReusableBuild> {
    builds
        .into_iter()
        .filter(ReusableBuild::is_passed)
        .max_by_key(|b| b.created_at)
}

/// Finds the newest passed build on one of `pipeline_slugs` for a commit in
/// the PR's recent lineage.
pub async fn find_green_build<G, I>(
    github: &G,
    index: &I,
    ctx: &EventContext,
    pipeline_slugs: &[String],
) -> Result<Option<ReusableBuild>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
    I: IndexInterpreter,
    I::Error: Display,
{
    let pr = &ctx.pull_request;
    if pr.commits >= MAX_PR_COMMITS {
        tracing::debug!(
            repo = %ctx.repo,
            pr = %pr.number,
            commits = pr.commits,
            "Too many commits to search for a green build"
        );
        return Ok(None);
    }

    let pr_commits = calls::list_pr_commits(github, &ctx.repo, pr.number).await?;
    let base_commits =
        calls::list_branch_commits(github, &ctx.repo, &pr.base.ref_name, BASE_COMMITS_COUNT)
            .await?;
    let candidates =
        commits_for_build_compare(&pr_commits, &base_commits, BASE_COMMITS_COUNT as usize);

    let builds = calls::search_build_jobs(index, &candidates, pipeline_slugs).await?;
    Ok(latest_passed(builds))
}

/// Finds a build `rule` may reuse for this PR.
///
/// Every failure along the way means "no reusable build".
pub async fn find_reusable_build<G, I>(
    github: &G,
    index: &I,
    rule: &Rule,
    ctx: &EventContext,
) -> Option<ReusableBuild>
where
    G: GitHubInterpreter,
    G::Error: Display,
    I: IndexInterpreter,
    I::Error: Display,
{
    if !rule.build_reuse || rule.build_reuse_pipeline_slugs.is_empty() {
        return None;
    }

    if let Some(label) = &rule.build_reuse_label
        && !ctx.pull_request.has_label(label)
    {
        return None;
    }

    match try_find_reusable_build(github, index, rule, ctx).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Build reuse lookup failed, building from scratch"
            );
            None
        }
    }
}

async fn try_find_reusable_build<G, I>(
    github: &G,
    index: &I,
    rule: &Rule,
    ctx: &EventContext,
) -> Result<Option<ReusableBuild>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
    I: IndexInterpreter,
    I::Error: Display,
{
    let Some(build) = find_green_build(github, index, ctx, &rule.build_reuse_pipeline_slugs).await?
    else {
        return Ok(None);
    };

    let head = &ctx.pull_request.head.sha;
    let files = calls::compare_commits(github, &ctx.repo, &build.commit, head).await?;
    if files.len() >= DIFF_FILE_LIMIT {
        tracing::info!(
            repo = %ctx.repo,
            pr = %ctx.pull_request.number,
            pipeline = %rule.pipeline_slug,
            build = build.build_number,
            "Diff since green build too large to reuse"
        );
        return Ok(None);
    }

    let mut skip = rule.skip_ci_on_only_changed.clone();
    skip.extend(rule.build_reuse_regexes.iter().cloned());
    let paths = PathRules::compile(&skip, &rule.always_require_ci_on_changed).map_err(|source| {
        EngineError::InvalidPattern {
            pattern: skip.join(", "),
            source,
        }
    })?;

    if paths.is_skippable(&files) {
        tracing::info!(
            repo = %ctx.repo,
            pr = %ctx.pull_request.number,
            pipeline = %rule.pipeline_slug,
            build = build.build_number,
            commit = %build.commit.short(),
            "Reusing green build"
        );
        Ok(Some(build))
    } else {
        Ok(None)
    }
}

/// Build parameters pointing the new run at the reused build.
pub fn reuse_env(build: &ReusableBuild) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("REUSABLE_BUILD_JOB_ID".to_string(), build.job_id.clone());
    env.insert("REUSABLE_BUILD_ID".to_string(), build.build_id.clone());
    env.insert("REUSABLE_BUILD_NUMBER".to_string(), build.build_number.to_string());
    env.insert("REUSABLE_BUILD_COMMIT".to_string(), build.commit.to_string());
    env.insert("REUSABLE_BUILD_BRANCH".to_string(), build.branch.clone());
    env.insert("REUSABLE_BUILD_PIPELINE_SLUG".to_string(), build.pipeline_slug.clone());
    if let Some(url) = &build.web_url {
        env.insert("REUSABLE_BUILD_URL".to_string(), url.clone());
    }
    env
}
