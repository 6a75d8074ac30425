//! Who may trigger a build.
//!
//! Checked after every cheap gate since it may cost two API calls. Lookup
//! failures count as "not authorized" and never fail the rule.

use std::fmt::Display;

use crate::effects::GitHubInterpreter;
use crate::rules::Rule;

use super::calls;
use super::context::EventContext;

/// Returns true if the acting user may trigger `rule`.
///
/// The user passes on the first of: the rule's allow-list, an allowed
/// repository permission level, or membership of `trusted_org` when the rule
/// allows org users.
pub async fn check_user_can_trigger<G>(
    github: &G,
    rule: &Rule,
    ctx: &EventContext,
    trusted_org: &str,
) -> bool
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let user = ctx.acting_user();

    if rule.allowed_list.iter().any(|u| u == user) {
        tracing::debug!(repo = %ctx.repo, pr = %ctx.pull_request.number, user, "User on allowed list");
        return true;
    }

    if !rule.allowed_repo_permissions.is_empty() {
        match calls::collaborator_permission(github, &ctx.repo, user).await {
            Ok(permission) if rule.allowed_repo_permissions.contains(&permission) => return true,
            Ok(permission) => {
                tracing::debug!(
                    repo = %ctx.repo,
                    pr = %ctx.pull_request.number,
                    user,
                    permission = %permission,
                    "Repository permission not in allowed set"
                );
            }
            Err(e) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    pr = %ctx.pull_request.number,
                    user,
                    error = %e,
                    "Failed to look up collaborator permission"
                );
            }
        }
    }

    if rule.allow_org_users {
        match calls::is_org_member(github, trusted_org, user).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    repo = %ctx.repo,
                    pr = %ctx.pull_request.number,
                    user,
                    org = trusted_org,
                    error = %e,
                    "Failed to check org membership"
                );
            }
        }
    }

    tracing::info!(
        repo = %ctx.repo,
        pr = %ctx.pull_request.number,
        pipeline = %rule.pipeline_slug,
        user,
        "Ignoring pull request from user without trigger rights"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{GitHubEffect, GitHubResponse};
    use crate::engine::context::TriggerType;
    use crate::rules::{RuleRecord, resolve_rule};
    use crate::test_utils::{MockGitHub, pull_request};
    use crate::types::RepoId;

    fn rule() -> Rule {
        resolve_rule(RuleRecord::default())
    }

    fn ctx() -> EventContext {
        EventContext::new(
            TriggerType::Update,
            RepoId::new("elastic", "kibana"),
            pull_request(7),
        )
    }

    #[tokio::test]
    async fn allow_list_needs_no_api_calls() {
        let github = MockGitHub::new(|_| panic!("no API call expected"));
        let mut rule = rule();
        rule.allowed_list = vec!["contributor".to_string()];
        rule.allowed_repo_permissions = vec!["admin".to_string()];
        rule.allow_org_users = true;

        assert!(check_user_can_trigger(&github, &rule, &ctx(), "elastic").await);
    }

    #[tokio::test]
    async fn commenter_is_the_acting_user() {
        let github = MockGitHub::new(|_| panic!("no API call expected"));
        let mut rule = rule();
        rule.allowed_list = vec!["maintainer".to_string()];

        let from_comment = ctx().with_comment("build this", "maintainer");
        assert!(check_user_can_trigger(&github, &rule, &from_comment, "elastic").await);
        assert!(!check_user_can_trigger(&github, &rule, &ctx(), "elastic").await);
    }

    #[tokio::test]
    async fn permission_level_must_be_allowed() {
        let github = MockGitHub::new(|effect| match effect {
            GitHubEffect::GetCollaboratorPermission { username, .. } if username == "contributor" => {
                Ok(GitHubResponse::Permission("write".to_string()))
            }
            other => panic!("unexpected effect {other:?}"),
        });
        let mut rule = rule();

        rule.allowed_repo_permissions = vec!["admin".to_string(), "write".to_string()];
        assert!(check_user_can_trigger(&github, &rule, &ctx(), "elastic").await);

        rule.allowed_repo_permissions = vec!["admin".to_string()];
        assert!(!check_user_can_trigger(&github, &rule, &ctx(), "elastic").await);
    }

    #[tokio::test]
    async fn permission_error_falls_through_to_org_membership() {
        let github = MockGitHub::new(|effect| match effect {
            GitHubEffect::GetCollaboratorPermission { .. } => Err("502 Bad Gateway".to_string()),
            GitHubEffect::CheckOrgMembership { org, .. } => {
                Ok(GitHubResponse::IsMember(org == "elastic"))
            }
            other => panic!("unexpected effect {other:?}"),
        });
        let mut rule = rule();
        rule.allowed_repo_permissions = vec!["write".to_string()];
        rule.allow_org_users = true;

        assert!(check_user_can_trigger(&github, &rule, &ctx(), "elastic").await);
        assert!(!check_user_can_trigger(&github, &rule, &ctx(), "other-org").await);
    }

    #[tokio::test]
    async fn membership_error_is_not_authorized() {
        let github = MockGitHub::new(|_| Err("404 Not Found".to_string()));
        let mut rule = rule();
        rule.allow_org_users = true;

        assert!(!check_user_can_trigger(&github, &rule, &ctx(), "elastic").await);
    }

    #[tokio::test]
    async fn org_membership_only_checked_when_allowed() {
        let github = MockGitHub::new(|_| panic!("no API call expected"));
        assert!(!check_user_can_trigger(&github, &rule(), &ctx(), "elastic").await);
        assert!(github.calls().is_empty());
    }
}
