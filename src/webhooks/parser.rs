//! Webhook payload parser.
//!
//! The event type comes from the `X-GitHub-Event` header. Deliveries the bot
//! does not act on (other event types, other actions, comments on plain
//! issues) parse to `Ok(None)`. Only malformed payloads of a handled type are
//! errors.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{CommentId, PrNumber, RepoId};

use super::events::{IssueCommentEvent, PrAction, PullRequestEvent, WebhookEvent};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A field the action requires was absent.
    #[error("missing field {0}")]
    MissingField(&'static str),
}

/// Parses a webhook payload into a typed event.
///
/// # Examples
///
/// ```
/// use pr_trigger_bot::webhooks::{WebhookEvent, parse_webhook};
///
/// let payload = br#"{
///     "action": "created",
///     "comment": { "id": 1, "body": "buildkite build this", "user": { "login": "octocat" } },
///     "issue": { "number": 42, "pull_request": { "url": "..." } },
///     "repository": { "owner": { "login": "elastic" }, "name": "kibana" }
/// }"#;
///
/// let event = parse_webhook("issue_comment", payload).unwrap().unwrap();
/// assert!(matches!(event, WebhookEvent::IssueComment(_)));
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<WebhookEvent>, ParseError> {
    match event_type {
        "issue_comment" => Ok(parse_issue_comment(payload)?.map(WebhookEvent::IssueComment)),
        "pull_request" => Ok(parse_pull_request(payload)?.map(WebhookEvent::PullRequest)),
        _ => Ok(None),
    }
}

// ─── Raw payloads ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawUser,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

// ─── issue_comment ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    comment: RawComment,
    issue: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    body: Option<String>,
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    /// Present only when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
}

fn parse_issue_comment(payload: &[u8]) -> Result<Option<IssueCommentEvent>, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;

    if raw.action != "created" || raw.issue.pull_request.is_none() {
        return Ok(None);
    }

    Ok(Some(IssueCommentEvent {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        pr_number: PrNumber(raw.issue.number),
        comment_id: CommentId(raw.comment.id),
        body: raw.comment.body.unwrap_or_default(),
        author: raw.comment.user.login,
    }))
}

// ─── pull_request ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    /// PR number; also present under `pull_request.number`.
    number: Option<u64>,
    pull_request: RawPullRequest,
    label: Option<RawLabel>,
    sender: Option<RawUser>,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    user: RawUser,
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<PullRequestEvent>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    let action = match raw.action.as_str() {
        "opened" => PrAction::Opened,
        "synchronize" => PrAction::Synchronize,
        "labeled" => PrAction::Labeled,
        _ => return Ok(None),
    };

    let label = raw.label.map(|l| l.name);
    if action == PrAction::Labeled && label.is_none() {
        return Err(ParseError::MissingField("label"));
    }

    Ok(Some(PullRequestEvent {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        action,
        pr_number: PrNumber(raw.number.unwrap_or(raw.pull_request.number)),
        label,
        sender: raw
            .sender
            .map(|s| s.login)
            .unwrap_or(raw.pull_request.user.login),
    }))
}
