//! GitHub API client and effect interpreter.
//!
//! Executes `GitHubEffect`s through octocrab, retrying transient failures
//! with exponential backoff and returning permanent ones immediately.

mod client;
mod error;
mod interpreter;
mod retry;

pub use client::GitHubClient;
pub use error::{GitHubApiError, GitHubErrorKind};
pub use interpreter::interpret_github_effect;
pub use retry::{RetryConfig, retry_with_backoff};
