//! Build dispatch: commit selection, build parameters, the trigger call and
//! its follow-ups (pending status, cancelling superseded builds).

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

use crate::effects::{BuildRequest, CiInterpreter, CommitState, GitHubInterpreter};
use crate::rules::Rule;
use crate::types::{CiBuild, ReusableBuild, Sha};

use super::calls::{self, StatusUpdate};
use super::context::EventContext;
use super::error::EngineError;
use super::gates::TriggerPath;
use super::reuse::reuse_env;

/// How long to wait for GitHub to compute mergeability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeablePolling {
    pub tries: u32,
    pub interval: Duration,
}

impl MergeablePolling {
    pub const DEFAULT: Self = Self {
        tries: 3,
        interval: Duration::from_secs(1),
    };

    /// No re-fetching; an unknown flag is treated as unknown.
    pub const NONE: Self = Self {
        tries: 0,
        interval: Duration::ZERO,
    };
}

impl Default for MergeablePolling {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The commit a build should run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitChoice {
    Build(Sha),
    /// The rule wants the merge commit but the PR cannot be merged.
    NotMergeable,
}

/// Picks the head commit, or the test-merge commit when the rule asks for it
/// and GitHub confirms the PR is mergeable.
pub async fn resolve_commit<G>(
    github: &G,
    rule: &Rule,
    ctx: &EventContext,
    polling: MergeablePolling,
) -> CommitChoice
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let head = ctx.pull_request.head.sha.clone();
    if !rule.use_merge_commit {
        return CommitChoice::Build(head);
    }

    let mut pr = ctx.pull_request.clone();
    let mut tries = 0;
    while pr.mergeable.is_none() && tries < polling.tries {
        tries += 1;
        tokio::time::sleep(polling.interval).await;
        match calls::get_pr(github, &ctx.repo, pr.number).await {
            Ok(fresh) => pr = fresh,
            Err(e) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    pr = %pr.number,
                    error = %e,
                    "Failed to re-fetch PR for mergeability"
                );
                break;
            }
        }
    }

    match (pr.mergeable, pr.merge_commit_sha) {
        (Some(true), Some(merge)) => CommitChoice::Build(merge),
        (Some(false), _) if rule.fail_on_not_mergeable => CommitChoice::NotMergeable,
        (mergeable, _) => {
            tracing::info!(
                repo = %ctx.repo,
                pr = %pr.number,
                pipeline = %rule.pipeline_slug,
                mergeable = ?mergeable,
                "Merge commit unavailable, building head commit"
            );
            CommitChoice::Build(head)
        }
    }
}

/// Turns a capture group name into an env var suffix: letters and
/// underscores only, upper-cased.
pub fn env_key(group: &str) -> String {
    group
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Build parameters describing the PR and the event.
pub fn build_env(ctx: &EventContext) -> BTreeMap<String, String> {
    let pr = &ctx.pull_request;
    let mut env = BTreeMap::new();
    let mut set = |key: &str, value: String| {
        env.insert(key.to_string(), value);
    };

    set("GITHUB_PR_NUMBER", pr.number.0.to_string());
    set("GITHUB_PR_TARGET_BRANCH", pr.base.ref_name.clone());
    set("GITHUB_PR_BASE_OWNER", pr.base.repo.owner.clone());
    set("GITHUB_PR_BASE_REPO", pr.base.repo.repo.clone());
    set("GITHUB_PR_OWNER", pr.head.repo.owner.clone());
    set("GITHUB_PR_REPO", pr.head.repo.repo.clone());
    set("GITHUB_PR_BRANCH", pr.head.ref_name.clone());
    set("GITHUB_PR_TRIGGERED_SHA", pr.head.sha.to_string());
    set("GITHUB_PR_LABELS", pr.labels.join(","));
    set("GITHUB_PR_TRIGGER_USER", ctx.acting_user().to_string());

    if let Some(parsed) = ctx.parsed_comment.as_ref().filter(|p| p.is_match()) {
        set("GITHUB_PR_TRIGGER_COMMENT", parsed.comment.clone());
        for (name, value) in parsed.groups.iter().flatten() {
            set(&format!("GITHUB_PR_COMMENT_VAR_{}", env_key(name)), value.clone());
        }
    }

    env
}

/// The branch the build is attributed to.
pub fn build_branch(rule: &Rule, ctx: &EventContext, path: TriggerPath) -> String {
    match (&rule.always_trigger_branch, path) {
        (Some(branch), TriggerPath::AlwaysTrigger) => branch.clone(),
        _ => format!(
            "{}:{}",
            ctx.pull_request.head.repo.owner, ctx.pull_request.head.ref_name
        ),
    }
}

pub fn build_request(
    rule: &Rule,
    ctx: &EventContext,
    path: TriggerPath,
    commit: &Sha,
    reused: Option<&ReusableBuild>,
) -> BuildRequest {
    let mut env = build_env(ctx);
    if let Some(build) = reused {
        env.extend(reuse_env(build));
    }

    BuildRequest {
        branch: build_branch(rule, ctx, path),
        commit: commit.to_string(),
        pull_request_base_branch: ctx.pull_request.base.ref_name.clone(),
        pull_request_id: ctx.pull_request.number.0,
        pull_request_repository: ctx.pull_request.head.git_url.clone(),
        env,
    }
}

/// Triggers the build, then posts the pending status and cancels superseded
/// builds. Only the trigger itself can fail the rule.
pub async fn trigger_build<G, C>(
    github: &G,
    ci: &C,
    rule: &Rule,
    ctx: &EventContext,
    request: BuildRequest,
) -> Result<CiBuild, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
    C: CiInterpreter,
    C::Error: Display,
{
    let branch = request.branch.clone();
    tracing::info!(
        repo = %ctx.repo,
        pr = %ctx.pull_request.number,
        pipeline = %rule.pipeline_slug,
        target = %ctx.pull_request.base.ref_name,
        "Triggering pipeline"
    );

    let build = calls::trigger_build(ci, &rule.pipeline_slug, request).await?;
    tracing::info!(
        repo = %ctx.repo,
        pr = %ctx.pull_request.number,
        pipeline = %rule.pipeline_slug,
        build = build.number,
        url = %build.web_url,
        "Triggered build"
    );

    if rule.reports_status() {
        let status = StatusUpdate {
            sha: &ctx.pull_request.head.sha,
            state: CommitState::Pending,
            context: &rule.commit_status_context,
            description: "Job queued",
            target_url: Some(&build.web_url),
        };
        if let Err(e) = calls::create_status(github, &ctx.repo, status).await {
            tracing::error!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Failed to create commit status"
            );
        }
    }

    let exempt = ctx.is_comment() && !rule.cancel_intermediate_builds_on_comment;
    if rule.cancel_intermediate_builds && !exempt {
        cancel_intermediate_builds(ci, rule, ctx, &branch, build.number).await;
    }

    Ok(build)
}

/// Cancels running builds of the same pipeline and branch older than `newest`.
async fn cancel_intermediate_builds<C>(
    ci: &C,
    rule: &Rule,
    ctx: &EventContext,
    branch: &str,
    newest: u64,
) where
    C: CiInterpreter,
    C::Error: Display,
{
    let running = match calls::running_builds(ci, &rule.pipeline_slug, branch).await {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Failed to list running builds"
            );
            return;
        }
    };

    for build in running.iter().filter(|b| b.number < newest) {
        match calls::cancel_build(ci, &rule.pipeline_slug, build.number).await {
            Ok(()) => tracing::info!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                build = build.number,
                "Cancelled intermediate build"
            ),
            Err(e) => tracing::error!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                build = build.number,
                error = %e,
                "Failed to cancel intermediate build"
            ),
        }
    }
}
