//! Source-control effect types.
//!
//! These describe GitHub API operations as data. The engine builds them and
//! an interpreter executes them. Unlike a repo-scoped client, every effect
//! names its repository: a single event can touch the PR's repository, a
//! separate configuration repository and several org-wide rule sources.

use serde::{Deserialize, Serialize};

use crate::types::{ChangedFile, CommentId, PrNumber, PullRequest, RepoId, Sha};

/// Commit status states accepted by the statuses API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

/// A GitHub API effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Repository Content ───────────────────────────────────────────────────
    /// Fetch a file at a ref.
    GetFileContent {
        repo: RepoId,
        git_ref: String,
        path: String,
    },

    // ─── PR Queries ───────────────────────────────────────────────────────────
    /// Fetch a single PR by number.
    GetPr { repo: RepoId, pr: PrNumber },

    /// List the PR's commits, oldest first.
    ListPrCommits { repo: RepoId, pr: PrNumber },

    /// List the most recent commits on a branch, newest first.
    ListBranchCommits {
        repo: RepoId,
        branch: String,
        count: u8,
    },

    /// Compare `base...head`. GitHub lists at most 300 files for a comparison.
    CompareCommits { repo: RepoId, base: Sha, head: Sha },

    /// List every file changed by the PR, following pagination.
    ListPrFiles { repo: RepoId, pr: PrNumber },

    // ─── Comments ─────────────────────────────────────────────────────────────
    /// List all comments on a PR.
    ListComments { repo: RepoId, pr: PrNumber },

    /// Delete an issue comment.
    DeleteComment { repo: RepoId, comment_id: CommentId },

    /// Post a new comment on a PR.
    PostComment {
        repo: RepoId,
        pr: PrNumber,
        body: String,
    },

    // ─── Statuses ─────────────────────────────────────────────────────────────
    /// Create a commit status.
    CreateCommitStatus {
        repo: RepoId,
        sha: Sha,
        state: CommitState,
        context: String,
        description: String,
        target_url: Option<String>,
    },

    // ─── Authorization ────────────────────────────────────────────────────────
    /// Get a user's permission level on a repository.
    GetCollaboratorPermission { repo: RepoId, username: String },

    /// Check whether a user is a member of an organization.
    CheckOrgMembership { org: String, username: String },
}

impl GitHubEffect {
    /// Whether this effect mutates state on GitHub.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GitHubEffect::DeleteComment { .. }
                | GitHubEffect::PostComment { .. }
                | GitHubEffect::CreateCommitStatus { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// Comment data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentData {
    pub id: CommentId,
    /// The author's login.
    pub author: String,
    pub body: String,
}

/// Response from a GitHub effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `GetFileContent`: base64 content as returned by the API.
    FileContent(String),

    /// Response to `GetPr`.
    Pr(Box<PullRequest>),

    /// Response to `ListPrCommits` and `ListBranchCommits`.
    Commits(Vec<Sha>),

    /// Response to `CompareCommits` and `ListPrFiles`.
    Files(Vec<ChangedFile>),

    /// Response to `ListComments`.
    Comments(Vec<CommentData>),

    /// Response to `DeleteComment`.
    CommentDeleted,

    /// Response to `PostComment`.
    CommentPosted {
        /// The ID of the newly created comment.
        id: CommentId,
    },

    /// Response to `CreateCommitStatus`.
    StatusCreated,

    /// Response to `GetCollaboratorPermission`: `admin`, `write`, `read`, `none`, ...
    Permission(String),

    /// Response to `CheckOrgMembership`.
    IsMember(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_serializes_with_type_tag() {
        let effect = GitHubEffect::GetPr {
            repo: RepoId::new("elastic", "kibana"),
            pr: PrNumber(42),
        };
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["type"], "get_pr");
        assert_eq!(json["pr"], 42);
        assert_eq!(json["repo"]["owner"], "elastic");
    }

    #[test]
    fn mutations_are_flagged() {
        let repo = RepoId::new("o", "r");
        assert!(
            GitHubEffect::PostComment {
                repo: repo.clone(),
                pr: PrNumber(1),
                body: "hi".into()
            }
            .is_mutation()
        );
        assert!(
            !GitHubEffect::ListComments {
                repo,
                pr: PrNumber(1)
            }
            .is_mutation()
        );
    }

    #[test]
    fn commit_state_api_strings() {
        assert_eq!(CommitState::Pending.as_api_str(), "pending");
        assert_eq!(CommitState::Success.as_api_str(), "success");
        assert_eq!(CommitState::Failure.as_api_str(), "failure");
        assert_eq!(CommitState::Error.as_api_str(), "error");
    }
}
