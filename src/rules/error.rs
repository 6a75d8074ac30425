//! Rule configuration errors.

use thiserror::Error;

use crate::types::RepoId;

/// Failure to resolve the rules for one repository.
///
/// These reject rule resolution for the affected repository only.
#[derive(Debug, Error)]
pub enum RuleConfigError {
    #[error("failed to fetch {path} from {repo}@{branch}: {message}")]
    Fetch {
        repo: RepoId,
        branch: String,
        path: String,
        message: String,
    },

    #[error("{path} in {repo} is not valid UTF-8 base64 content: {message}")]
    Decode {
        repo: RepoId,
        path: String,
        message: String,
    },

    #[error("{path} in {repo} is not a valid rule file: {source}")]
    Json {
        repo: RepoId,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid org-wide rule location '{0}', expected owner/repo[:branch[:path]]")]
    InvalidLocator(String),

    #[error("unexpected response while fetching rule file: {0}")]
    UnexpectedResponse(String),
}
