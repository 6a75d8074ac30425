//! Turns typed webhook events into event contexts for the engine.
//!
//! Intake owns the steps between a verified delivery and rule evaluation:
//! dropping repositories the bot has no rules for, waiting for label
//! automation to settle on freshly opened PRs, and re-fetching the PR so the
//! engine sees its current labels and mergeability.

use std::fmt::Display;
use std::time::Duration;

use crate::effects::{CiInterpreter, GitHubInterpreter, IndexInterpreter};
use crate::engine::{Disposition, Engine, EngineError, EventContext, RuleOutcome, calls};
use crate::webhooks::{PrAction, WebhookEvent};

/// Default wait before a newly opened PR is evaluated.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Handles one webhook event end to end.
///
/// Events for repositories with neither a mapping nor the trusted owner are
/// dropped before any API call and yield no outcomes.
pub async fn process_event<G, C, I>(
    engine: &Engine<G, C, I>,
    event: WebhookEvent,
    settle_delay: Duration,
) -> Result<Vec<RuleOutcome>, EngineError>
where
    G: GitHubInterpreter + Sync,
    G::Error: Display,
    C: CiInterpreter + Sync,
    C::Error: Display,
    I: IndexInterpreter + Sync,
    I::Error: Display,
{
    let repo = event.repo().clone();
    let pr_number = event.pr_number();

    if !engine.rules().is_known(&repo) {
        tracing::debug!(repo = %repo, pr = %pr_number, "Ignoring event for unknown repository");
        return Ok(Vec::new());
    }

    if let WebhookEvent::PullRequest(e) = &event
        && e.action == PrAction::Opened
        && !settle_delay.is_zero()
    {
        tracing::debug!(
            repo = %repo,
            pr = %pr_number,
            delay_ms = settle_delay.as_millis() as u64,
            "Waiting for new PR to settle"
        );
        tokio::time::sleep(settle_delay).await;
    }

    let pull_request = calls::get_pr(engine.github(), &repo, pr_number).await?;
    let ctx = EventContext::new(event.trigger_type(), repo, pull_request);
    let ctx = match event {
        WebhookEvent::IssueComment(c) => ctx.with_comment(c.body, c.author),
        WebhookEvent::PullRequest(e) => match e.label {
            Some(label) => ctx.with_label(label),
            None => ctx,
        },
    };

    engine.handle_context(ctx).await
}

/// Logs each rule's disposition.
pub fn log_outcomes(repo: &str, pr: u64, outcomes: &[RuleOutcome]) {
    for outcome in outcomes {
        let pipeline = outcome.pipeline_slug.as_str();
        match &outcome.disposition {
            Disposition::Triggered {
                build,
                reused_build,
            } => tracing::info!(
                repo,
                pr,
                pipeline,
                build = build.number,
                url = %build.web_url,
                reused_build = ?reused_build,
                "Triggered build"
            ),
            Disposition::Failed(error) => {
                tracing::error!(repo, pr, pipeline, error = %error, "Rule failed")
            }
            other => tracing::info!(repo, pr, pipeline, disposition = ?other, "Rule not triggered"),
        }
    }
}
