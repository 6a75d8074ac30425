//! Blocks CI for release branches that will not ship again.
//!
//! A bare `major.minor` target branch must appear in the live-branches
//! manifest. When it does not, the PR gets one explanatory comment and the
//! rule is blocked.

use std::fmt::Display;

use serde::Deserialize;

use crate::effects::GitHubInterpreter;
use crate::rules::{FileLocation, decode_content};

use super::calls;
use super::context::EventContext;
use super::error::EngineError;

const COMMENT_PREFIX: &str = "CI was triggered for this PR, but this PR targets";

/// Who to ask when a branch is wrongly considered closed.
pub const SUPPORT_CONTACT: &str = "`#kibana-operations`";

#[derive(Debug, Deserialize)]
struct VersionsManifest {
    #[serde(default)]
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    branch: String,
}

/// Whether `branch` looks like `8.17`.
pub fn is_release_branch(branch: &str) -> bool {
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    branch
        .split_once('.')
        .is_some_and(|(major, minor)| is_number(major) && is_number(minor))
}

/// Branch names listed in a manifest document.
pub fn parse_open_branches(json: &str) -> Result<Vec<String>, serde_json::Error> {
    let manifest: VersionsManifest = serde_json::from_str(json)?;
    Ok(manifest.versions.into_iter().map(|v| v.branch).collect())
}

pub fn stale_branch_comment(target: &str, open_branches: &[String]) -> String {
    let list: Vec<String> = open_branches.iter().map(|b| format!("* {b}")).collect();
    format!(
        "{COMMENT_PREFIX} {target} which should not receive a future release. \
         CI is not supported for these branches. Please consult the release schedule, \
         or contact {SUPPORT_CONTACT} if you believe this is an error.\n\n\
         The following branches are currently considered to be open:\n{}",
        list.join("\n")
    )
}

async fn open_branches<G>(github: &G, manifest: &FileLocation) -> Result<Vec<String>, String>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let encoded = calls::get_file(github, &manifest.repo, &manifest.branch, &manifest.path)
        .await
        .map_err(|e| e.to_string())?;
    let json = decode_content(&encoded)?;
    parse_open_branches(&json).map_err(|e| e.to_string())
}

/// Returns true when dispatch must be blocked.
///
/// A manifest that cannot be read lets the build through. Comment failures
/// are logged and the rule stays blocked.
pub async fn check_stale_branch<G>(
    github: &G,
    ctx: &EventContext,
    manifest: &FileLocation,
    bot_login: Option<&str>,
) -> bool
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let target = &ctx.pull_request.base.ref_name;
    if !is_release_branch(target) {
        return false;
    }

    let open = match open_branches(github, manifest).await {
        Ok(open) => open,
        Err(e) => {
            tracing::warn!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                manifest = %manifest,
                error = %e,
                "Failed to read live-branches manifest, allowing build"
            );
            return false;
        }
    };

    if open.iter().any(|b| b == target) {
        return false;
    }

    tracing::info!(
        repo = %ctx.repo,
        pr = %ctx.pull_request.number,
        branch = %target,
        "Blocking CI for closed release branch"
    );

    let body = stale_branch_comment(target, &open);
    if let Err(e) = replace_comment(github, ctx, body, bot_login).await {
        tracing::error!(
            repo = %ctx.repo,
            pr = %ctx.pull_request.number,
            error = %e,
            "Failed to post stale branch comment"
        );
    }
    true
}

/// Posts `body` unless an identical bot comment exists, removing older
/// variants first.
async fn replace_comment<G>(
    github: &G,
    ctx: &EventContext,
    body: String,
    bot_login: Option<&str>,
) -> Result<(), EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let pr = ctx.pull_request.number;
    let previous: Vec<_> = calls::list_comments(github, &ctx.repo, pr)
        .await?
        .into_iter()
        .filter(|c| c.body.starts_with(COMMENT_PREFIX))
        .filter(|c| bot_login.is_none_or(|login| c.author == login))
        .collect();

    if previous.iter().any(|c| c.body == body) {
        tracing::debug!(repo = %ctx.repo, pr = %pr, "Stale branch comment already posted");
        return Ok(());
    }

    for comment in &previous {
        if let Err(e) = calls::delete_comment(github, &ctx.repo, comment.id).await {
            tracing::warn!(
                repo = %ctx.repo,
                pr = %pr,
                comment_id = %comment.id,
                error = %e,
                "Failed to delete outdated comment"
            );
        }
    }

    calls::post_comment(github, &ctx.repo, pr, body).await?;
    Ok(())
}
