//! Webhook endpoint handler.
//!
//! Verifies the delivery signature, parses the payload and hands handled
//! events to a spawned task before answering 202 Accepted. Rule evaluation
//! never blocks the response.

use std::fmt::Display;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::effects::{CiInterpreter, GitHubInterpreter, IndexInterpreter};
use crate::intake;
use crate::types::DeliveryId;
use crate::webhooks::{ParseError, parse_webhook, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when accepting a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: the event was handed to the engine
/// - 200 OK: verified, but not an event the bot acts on
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: invalid signature
pub async fn webhook_handler<G, C, I>(
    State(app_state): State<AppState<G, C, I>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError>
where
    G: GitHubInterpreter + Send + Sync + 'static,
    G::Error: Display + Send,
    C: CiInterpreter + Send + Sync + 'static,
    C::Error: Display + Send,
    I: IndexInterpreter + Send + Sync + 'static,
    I::Error: Display + Send,
{
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;
    let delivery_id = DeliveryId::new(get_header(&headers, HEADER_DELIVERY).unwrap_or_default());

    debug!(delivery_id = %delivery_id, event_type = %event_type, "Received webhook");

    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let Some(event) = parse_webhook(&event_type, &body)? else {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring webhook");
        return Ok((StatusCode::OK, "Ignored"));
    };

    let repo = event.repo().to_string();
    let pr = event.pr_number().0;
    info!(
        delivery_id = %delivery_id,
        repo = %repo,
        pr,
        trigger = event.trigger_type().as_str(),
        "Accepted webhook"
    );

    let engine = Arc::clone(app_state.engine());
    let settle_delay = app_state.settle_delay();
    tokio::spawn(async move {
        match intake::process_event(&engine, event, settle_delay).await {
            Ok(outcomes) => intake::log_outcomes(&repo, pr, &outcomes),
            Err(e) => error!(repo = %repo, pr, error = %e, "Failed to process webhook event"),
        }
    });

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
