//! Typed webhook events.
//!
//! Only the deliveries that can start a build are represented:
//!
//! - `pull_request` with action `opened`, `synchronize` or `labeled`
//! - `issue_comment` with action `created`, on a pull request
//!
//! Everything else is dropped by the parser.

use serde::{Deserialize, Serialize};

use crate::engine::TriggerType;
use crate::types::{CommentId, PrNumber, RepoId};

/// A webhook delivery the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    PullRequest(PullRequestEvent),
    IssueComment(IssueCommentEvent),
}

impl WebhookEvent {
    /// The repository the PR targets.
    pub fn repo(&self) -> &RepoId {
        match self {
            WebhookEvent::PullRequest(e) => &e.repo,
            WebhookEvent::IssueComment(e) => &e.repo,
        }
    }

    pub fn pr_number(&self) -> PrNumber {
        match self {
            WebhookEvent::PullRequest(e) => e.pr_number,
            WebhookEvent::IssueComment(e) => e.pr_number,
        }
    }

    pub fn trigger_type(&self) -> TriggerType {
        match self {
            WebhookEvent::PullRequest(e) => e.action.trigger_type(),
            WebhookEvent::IssueComment(_) => TriggerType::Comment,
        }
    }
}

/// Pull request actions that can trigger a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Opened,
    Synchronize,
    Labeled,
}

impl PrAction {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            PrAction::Opened => TriggerType::Create,
            PrAction::Synchronize => TriggerType::Update,
            PrAction::Labeled => TriggerType::Label,
        }
    }
}

/// A `pull_request` delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    /// The base repository.
    pub repo: RepoId,
    pub action: PrAction,
    pub pr_number: PrNumber,
    /// The label just applied. Only set for `labeled`.
    pub label: Option<String>,
    /// Login of the user who caused the delivery.
    pub sender: String,
}

/// An `issue_comment.created` delivery on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    pub repo: RepoId,
    pub pr_number: PrNumber,
    pub comment_id: CommentId,
    pub body: String,
    pub author: String,
}
