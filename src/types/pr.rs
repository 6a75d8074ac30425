//! Pull request snapshot types.
//!
//! A `PullRequest` is the engine's view of a PR at the moment an event is
//! handled. It is fetched fresh from the API for every event rather than
//! taken from the webhook payload, so label changes made by automation
//! between delivery and handling are visible.

use serde::{Deserialize, Serialize};

use super::ids::{PrNumber, RepoId, Sha};

/// The state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
}

impl PrState {
    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
        }
    }
}

/// One side (base or head) of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name, without `refs/heads/`.
    pub ref_name: String,
    /// Tip commit of the branch when the PR was fetched.
    pub sha: Sha,
    /// Repository owning the branch. For forks this differs from the base repo.
    pub repo: RepoId,
    /// Git URL of the owning repository, if the API reported one.
    pub git_url: Option<String>,
}

/// A snapshot of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: PrNumber,
    pub state: PrState,
    /// Login of the PR author.
    pub author: String,
    pub base: BranchRef,
    pub head: BranchRef,
    /// Label names currently on the PR.
    pub labels: Vec<String>,
    /// GitHub's mergeability flag. `None` while GitHub is still computing it.
    pub mergeable: Option<bool>,
    /// Test-merge commit GitHub maintains for open PRs.
    pub merge_commit_sha: Option<Sha>,
    /// Number of files changed by the PR as a whole.
    pub changed_files: u64,
    /// Number of commits on the PR.
    pub commits: u64,
    pub draft: bool,
}

impl PullRequest {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Returns true if the PR carries at least one of `names`.
    pub fn has_any_label(&self, names: &[String]) -> bool {
        names.iter().any(|n| self.has_label(n))
    }
}

/// A file in a diff, with its pre-rename path when it was renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub previous_filename: Option<String>,
}

impl ChangedFile {
    pub fn new(filename: impl Into<String>) -> Self {
        ChangedFile {
            filename: filename.into(),
            previous_filename: None,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        ChangedFile {
            filename: to.into(),
            previous_filename: Some(from.into()),
        }
    }

    /// Iterates over every path this change touches (current, then previous).
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.filename.as_str()).chain(self.previous_filename.as_deref())
    }
}
