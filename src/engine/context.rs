//! The normalized view of one inbound event.

use crate::comment::ParsedComment;
use crate::types::{PullRequest, RepoId};

/// What kind of event triggered evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerType {
    /// PR opened.
    Create,
    /// New commits pushed.
    Update,
    /// Comment created on the PR.
    Comment,
    /// Label applied.
    Label,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Create => "create",
            TriggerType::Update => "update",
            TriggerType::Comment => "comment",
            TriggerType::Label => "label",
        }
    }

    /// Whether the event was a PR being opened or pushed to.
    pub fn is_commit_event(&self) -> bool {
        matches!(self, TriggerType::Create | TriggerType::Update)
    }
}

/// The comment that triggered a comment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerComment {
    pub body: String,
    pub author: String,
}

/// One event, normalized. Built once per webhook and consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub trigger: TriggerType,
    /// The repository the PR targets.
    pub repo: RepoId,
    pub pull_request: PullRequest,
    pub comment: Option<TriggerComment>,
    pub label: Option<String>,
    /// Set by the engine when a comment matches a rule's trigger pattern.
    pub parsed_comment: Option<ParsedComment>,
}

impl EventContext {
    pub fn new(trigger: TriggerType, repo: RepoId, pull_request: PullRequest) -> Self {
        Self {
            trigger,
            repo,
            pull_request,
            comment: None,
            label: None,
            parsed_comment: None,
        }
    }

    pub fn with_comment(mut self, body: impl Into<String>, author: impl Into<String>) -> Self {
        self.comment = Some(TriggerComment {
            body: body.into(),
            author: author.into(),
        });
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The user whose permissions gate the build: the commenter if there is
    /// one, otherwise the PR author.
    pub fn acting_user(&self) -> &str {
        self.comment
            .as_ref()
            .map(|c| c.author.as_str())
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.pull_request.author)
    }

    pub fn is_comment(&self) -> bool {
        self.trigger == TriggerType::Comment
    }
}
