//! Inbound GitHub webhooks.
//!
//! - [`signature`]: HMAC-SHA256 verification of deliveries
//! - [`parser`]: raw payloads into typed [`WebhookEvent`]s
//! - [`events`]: the events the bot acts on

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{IssueCommentEvent, PrAction, PullRequestEvent, WebhookEvent};
pub use parser::{ParseError, parse_webhook};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
