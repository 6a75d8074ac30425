use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_trigger_bot::buildkite::BuildkiteClient;
use pr_trigger_bot::config::AppConfig;
use pr_trigger_bot::engine::{Engine, EngineSettings, MergeablePolling};
use pr_trigger_bot::github::GitHubClient;
use pr_trigger_bot::rules::{RuleConfig, SystemClock};
use pr_trigger_bot::search::SearchClient;
use pr_trigger_bot::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_trigger_bot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let github = GitHubClient::from_token(config.github_token.clone())
        .context("failed to build GitHub client")?
        .with_dry_run(config.dry_run);
    let buildkite = BuildkiteClient::new(
        config.buildkite_base_url.clone(),
        config.buildkite_token.clone(),
        config.buildkite_org.clone(),
    )
    .with_dry_run(config.dry_run);
    let search = SearchClient::new(config.search.clone());
    if !search.is_enabled() {
        tracing::warn!("ES_URL not set, build reuse and smart skip will find no prior builds");
    }

    let rules = RuleConfig::new(
        config.repo_mappings.clone(),
        config.org_wide_configs.clone(),
        config.trusted_org.clone(),
        Arc::new(SystemClock),
    );
    let settings = EngineSettings {
        bot_login: config.bot_login.clone(),
        live_branches_manifest: config.live_branches_manifest.clone(),
        mergeable_polling: MergeablePolling::DEFAULT,
    };
    let engine = Engine::new(github, buildkite, search, rules, settings);

    let state = AppState::new(
        Arc::new(engine),
        config.webhook_secret.as_bytes(),
        config.settle_delay,
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        trusted_org = %config.trusted_org,
        dry_run = config.dry_run,
        "Listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
