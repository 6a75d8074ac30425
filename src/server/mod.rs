//! HTTP server for the trigger bot.
//!
//! # Endpoints
//!
//! - `POST /webhook` - GitHub webhook deliveries (202 Accepted once verified)
//! - `GET /live`, `GET /health` - liveness

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::effects::{CiInterpreter, GitHubInterpreter, IndexInterpreter};
use crate::engine::Engine;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state, handed to handlers through axum's `State`.
pub struct AppState<G, C, I> {
    inner: Arc<AppStateInner<G, C, I>>,
}

struct AppStateInner<G, C, I> {
    engine: Arc<Engine<G, C, I>>,

    /// Secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    /// Wait applied to newly opened PRs before evaluation.
    settle_delay: Duration,
}

impl<G, C, I> Clone for AppState<G, C, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G, C, I> AppState<G, C, I> {
    pub fn new(
        engine: Arc<Engine<G, C, I>>,
        webhook_secret: impl Into<Vec<u8>>,
        settle_delay: Duration,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                engine,
                webhook_secret: webhook_secret.into(),
                settle_delay,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<Engine<G, C, I>> {
        &self.inner.engine
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn settle_delay(&self) -> Duration {
        self.inner.settle_delay
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<G, C, I>(app_state: AppState<G, C, I>) -> axum::Router
where
    G: GitHubInterpreter + Send + Sync + 'static,
    G::Error: Display + Send,
    C: CiInterpreter + Send + Sync + 'static,
    C::Error: Display + Send,
    I: IndexInterpreter + Send + Sync + 'static,
    I::Error: Display + Send,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<G, C, I>))
        .route("/live", get(health_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::engine::{EngineSettings, MergeablePolling};
    use crate::rules::{FileLocation, ManualClock, RepoMappings, RuleConfig};
    use crate::test_utils::{MockCi, MockGitHub, MockIndex};
    use crate::webhooks::{compute_signature, format_signature_header};

    const SECRET: &[u8] = b"test-secret";

    type TestState = AppState<MockGitHub, MockCi, MockIndex>;

    fn app_state() -> TestState {
        let rules = RuleConfig::new(
            RepoMappings::default(),
            Vec::new(),
            "elastic",
            Arc::new(ManualClock::new()),
        );
        let settings = EngineSettings {
            bot_login: None,
            live_branches_manifest: FileLocation::parse_with_defaults(
                "elastic/kibana",
                "main",
                "versions.json",
            )
            .unwrap(),
            mergeable_polling: MergeablePolling::NONE,
        };
        let engine = Engine::new(
            MockGitHub::new(|_| Err("offline".to_string())),
            MockCi::accepting(),
            MockIndex::empty(),
            rules,
            settings,
        );
        AppState::new(Arc::new(engine), SECRET.to_vec(), Duration::ZERO)
    }

    fn webhook_request(secret: &[u8], event_type: &str, body: &serde_json::Value) -> Request<Body> {
        let body_bytes = serde_json::to_vec(body).unwrap();
        let signature = format_signature_header(&compute_signature(&body_bytes, secret));

        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-event", event_type)
            .header("x-github-delivery", "550e8400-e29b-41d4-a716-446655440000")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body_bytes))
            .unwrap()
    }

    fn comment_payload() -> serde_json::Value {
        serde_json::json!({
            "action": "created",
            "comment": { "id": 1, "body": "buildkite build this", "user": { "login": "maintainer" } },
            "issue": { "number": 42, "pull_request": { "url": "https://api.github.com/repos/elastic/kibana/pulls/42" } },
            "repository": { "owner": { "login": "elastic" }, "name": "kibana" }
        })
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn app_state_accessors() {
        let state = app_state();
        let cloned = state.clone();

        assert_eq!(cloned.webhook_secret(), SECRET);
        assert_eq!(cloned.settle_delay(), Duration::ZERO);
        assert!(Arc::ptr_eq(state.engine(), cloned.engine()));
    }

    #[tokio::test]
    async fn liveness_endpoints_return_200() {
        for uri in ["/live", "/health"] {
            let app = build_router(app_state());
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();

            let response = app.oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "OK");
        }
    }

    #[tokio::test]
    async fn handled_event_returns_202() {
        let app = build_router(app_state());

        let response = app
            .oneshot(webhook_request(SECRET, "issue_comment", &comment_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn unhandled_event_is_acknowledged() {
        let app = build_router(app_state());
        let body = serde_json::json!({ "zen": "Keep it logically awesome." });

        let response = app
            .oneshot(webhook_request(SECRET, "ping", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Ignored");
    }

    #[tokio::test]
    async fn invalid_signature_returns_401() {
        let state = app_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(webhook_request(b"wrong-secret", "issue_comment", &comment_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(state.engine().github().calls().is_empty());
    }

    #[tokio::test]
    async fn missing_event_header_returns_400() {
        let app = build_router(app_state());
        let body_bytes = serde_json::to_vec(&comment_payload()).unwrap();
        let signature = format_signature_header(&compute_signature(&body_bytes, SECRET));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body_bytes))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_payload_returns_400() {
        let app = build_router(app_state());
        let body = serde_json::json!({ "action": "created" });

        let response = app
            .oneshot(webhook_request(SECRET, "issue_comment", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
