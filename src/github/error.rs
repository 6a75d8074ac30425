//! GitHub API errors, classified for retry.

use std::fmt;
use thiserror::Error;

/// Whether retrying a failed call can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// HTTP 5xx, 429, 403 rate limiting, and transport failures.
    Transient,

    /// Other 4xx answers (a missing rule file is a 404) and malformed responses.
    Permanent,
}

impl GitHubErrorKind {
    pub fn is_retriable(&self) -> bool {
        *self == GitHubErrorKind::Transient
    }
}

/// A failed GitHub call.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {code}): {}", self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    fn without_source(kind: GitHubErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// An error raised locally, such as an unexpected response shape.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self::without_source(GitHubErrorKind::Permanent, message)
    }

    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self::without_source(GitHubErrorKind::Transient, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

impl From<octocrab::Error> for GitHubApiError {
    fn from(err: octocrab::Error) -> Self {
        let status_code = status_code(&err);
        let message = err.to_string();
        Self {
            kind: classify(status_code, &message),
            status_code,
            message,
            source: Some(err),
        }
    }
}

fn status_code(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        // Transport errors only mention the status in their text.
        other => {
            let text = other.to_string();
            let rest = &text[text.find("status: ")? + "status: ".len()..];
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
    }
}

fn classify(status_code: Option<u16>, message: &str) -> GitHubErrorKind {
    let message = message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

    match status_code {
        Some(429) | Some(500..=599) => GitHubErrorKind::Transient,
        Some(403) if mentions(&["rate limit", "abuse detection"]) => GitHubErrorKind::Transient,
        Some(_) => GitHubErrorKind::Permanent,
        None if mentions(&["timeout", "timed out", "connection", "network", "dns"]) => {
            GitHubErrorKind::Transient
        }
        None => GitHubErrorKind::Permanent,
    }
}
