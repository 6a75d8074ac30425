//! Interpreter traits, one per collaborator.
//!
//! Production implementations live in `github`, `buildkite` and `search`.
//! Tests answer effects from closures and record what the engine asked for.

use std::future::Future;

use super::ci::{CiEffect, CiResponse};
use super::github::{GitHubEffect, GitHubResponse};
use super::index::{IndexEffect, IndexResponse};

/// Runs [`GitHubEffect`]s.
///
/// Each effect has exactly one matching [`GitHubResponse`] variant; the
/// engine treats any other variant as an error. A canned interpreter:
///
/// ```
/// use std::future::{Future, ready};
/// use pr_trigger_bot::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
///
/// struct NobodyIsAMember;
///
/// impl GitHubInterpreter for NobodyIsAMember {
///     type Error = String;
///
///     fn interpret(
///         &self,
///         effect: GitHubEffect,
///     ) -> impl Future<Output = Result<GitHubResponse, String>> + Send {
///         ready(match effect {
///             GitHubEffect::CheckOrgMembership { .. } => Ok(GitHubResponse::IsMember(false)),
///             other => Err(format!("unexpected {other:?}")),
///         })
///     }
/// }
/// ```
pub trait GitHubInterpreter {
    type Error;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send;
}

/// Runs [`CiEffect`]s against the build orchestrator.
pub trait CiInterpreter {
    type Error;

    fn interpret(
        &self,
        effect: CiEffect,
    ) -> impl Future<Output = Result<CiResponse, Self::Error>> + Send;
}

/// Runs [`IndexEffect`]s against the build-result index.
pub trait IndexInterpreter {
    type Error;

    fn interpret(
        &self,
        effect: IndexEffect,
    ) -> impl Future<Output = Result<IndexResponse, Self::Error>> + Send;
}
