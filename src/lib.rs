//! PR Trigger Bot - decides which CI pipelines to start for GitHub pull request events.
//!
//! Webhooks are verified and parsed in [`webhooks`], normalized in [`intake`]
//! and evaluated against per-repository rules by the [`engine`], which talks
//! to GitHub, the build orchestrator and the build-result index only through
//! the interpreter traits in [`effects`].

pub mod buildkite;
pub mod comment;
pub mod config;
pub mod effects;
pub mod engine;
pub mod github;
pub mod intake;
pub mod rules;
pub mod search;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
