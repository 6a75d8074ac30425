//! Engine errors.

use thiserror::Error;

use crate::rules::RuleConfigError;

/// A failure while evaluating rules for one event.
///
/// Collaborator errors are carried as strings so the engine only needs the
/// interpreters' error types to implement `Display`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("orchestration service error: {0}")]
    Ci(String),

    #[error("build index error: {0}")]
    Index(String),

    #[error(transparent)]
    Rules(#[from] RuleConfigError),

    /// An interpreter answered with a response variant that does not belong
    /// to the effect it was given.
    #[error("unexpected response to {effect}: {response}")]
    UnexpectedResponse {
        effect: &'static str,
        response: String,
    },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
