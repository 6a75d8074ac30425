//! The trigger decision engine.
//!
//! For every rule configured for the event's repository the engine runs the
//! gates in order, cheapest first, and stops at the first that fails:
//!
//! 1. strict requirements (enabled, target branch, skip-ci labels)
//! 2. the general trigger, or failing that the always-trigger phrase
//! 3. authorization of the acting user
//! 4. dispatch: stale-branch guard, CI skip, commit selection, build reuse,
//!    then the trigger itself
//!
//! Each rule ends in a [`Disposition`]. A failure while handling one rule is
//! recorded against that rule and never stops the others.

pub mod auth;
pub mod calls;
pub mod context;
pub mod dispatch;
mod error;
pub mod gates;
pub mod paths;
pub mod reuse;
pub mod skip;
pub mod stale_branch;


use std::fmt::Display;

use tracing::Instrument;

use crate::effects::{CiInterpreter, CommitState, GitHubInterpreter, IndexInterpreter};
use crate::rules::{FileLocation, Rule, RuleConfig};
use crate::types::CiBuild;

use calls::StatusUpdate;
use dispatch::{CommitChoice, build_request, resolve_commit};
use gates::{TriggerPath, check_strict_requirements, evaluate_trigger};

pub use context::{EventContext, TriggerComment, TriggerType};
pub use dispatch::MergeablePolling;
pub use error::EngineError;
pub use paths::{PathRules, paths_are_fully_skippable};

const SKIPPED_DESCRIPTION: &str = "CI skipped, only skippable files changed";
const NOT_MERGEABLE_DESCRIPTION: &str = "PR is not mergeable";
const NOT_MERGEABLE_COMMENT: &str =
    "CI was triggered for this PR, but it is not mergeable. Please resolve conflicts with the \
     target branch and trigger CI again.";

/// Why a rule was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The target is a release branch that no longer ships.
    StaleBranch,
    /// The rule wants the merge commit and the PR has conflicts.
    NotMergeable,
}

/// What happened to one rule for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A strict requirement failed.
    NotApplicable,
    /// The event is not one this rule triggers on.
    NotEligible,
    /// The acting user may not trigger this rule.
    Unauthorized,
    /// Only skippable paths changed.
    SkippedCi,
    Blocked(BlockReason),
    Triggered {
        build: CiBuild,
        /// Number of the build whose artifacts are reused, if any.
        reused_build: Option<u64>,
    },
    /// Handling the rule failed.
    Failed(String),
}

impl Disposition {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Disposition::Triggered { .. })
    }
}

/// The disposition of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub pipeline_slug: String,
    pub disposition: Disposition,
}

/// Process-wide engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// The bot's own login. When set, only its comments are de-duplicated.
    pub bot_login: Option<String>,
    /// Where the live-branches manifest lives.
    pub live_branches_manifest: FileLocation,
    pub mergeable_polling: MergeablePolling,
}

/// The decision engine, generic over its three collaborators.
pub struct Engine<G, C, I> {
    github: G,
    ci: C,
    index: I,
    rules: RuleConfig,
    settings: EngineSettings,
}

impl<G, C, I> Engine<G, C, I>
where
    G: GitHubInterpreter + Sync,
    G::Error: Display,
    C: CiInterpreter + Sync,
    C::Error: Display,
    I: IndexInterpreter + Sync,
    I::Error: Display,
{
    pub fn new(github: G, ci: C, index: I, rules: RuleConfig, settings: EngineSettings) -> Self {
        Self {
            github,
            ci,
            index,
            rules,
            settings,
        }
    }

    pub fn github(&self) -> &G {
        &self.github
    }

    pub fn ci(&self) -> &C {
        &self.ci
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn rules(&self) -> &RuleConfig {
        &self.rules
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Evaluates every rule for the event.
    ///
    /// Only a failure to resolve the repository's rules is an error; failures
    /// while handling a rule are reported as [`Disposition::Failed`].
    pub async fn handle_context(
        &self,
        ctx: EventContext,
    ) -> Result<Vec<RuleOutcome>, EngineError> {
        let span = tracing::info_span!(
            "handle_context",
            repo = %ctx.repo,
            pr = %ctx.pull_request.number,
            trigger = ctx.trigger.as_str(),
        );
        self.handle_context_inner(ctx).instrument(span).await
    }

    async fn handle_context_inner(
        &self,
        mut ctx: EventContext,
    ) -> Result<Vec<RuleOutcome>, EngineError> {
        if !ctx.pull_request.state.is_open() {
            tracing::info!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                state = ctx.pull_request.state.as_str(),
                "Ignoring PR that is not open"
            );
            return Ok(Vec::new());
        }

        tracing::info!(repo = %ctx.repo, pr = %ctx.pull_request.number, "Handling trigger event");

        let rules = self.rules.get_rules_for(&self.github, &ctx.repo).await?;
        Ok(self.evaluate_rules(&rules, &mut ctx).await)
    }

    /// Runs every rule against the event, in order.
    pub async fn evaluate_rules(&self, rules: &[Rule], ctx: &mut EventContext) -> Vec<RuleOutcome> {
        let mut outcomes = Vec::with_capacity(rules.len());

        for rule in rules {
            let disposition = if check_strict_requirements(rule, ctx) {
                ctx.parsed_comment = None;
                match self.evaluate_rule(rule, ctx).await {
                    Ok(disposition) => disposition,
                    Err(e) => {
                        tracing::error!(
                            repo = %ctx.repo,
                            pr = %ctx.pull_request.number,
                            pipeline = %rule.pipeline_slug,
                            error = %e,
                            "Failed to handle rule"
                        );
                        Disposition::Failed(e.to_string())
                    }
                }
            } else {
                Disposition::NotApplicable
            };

            tracing::debug!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                disposition = ?disposition,
                "Rule evaluated"
            );
            outcomes.push(RuleOutcome {
                pipeline_slug: rule.pipeline_slug.clone(),
                disposition,
            });
        }

        outcomes
    }

    async fn evaluate_rule(
        &self,
        rule: &Rule,
        ctx: &mut EventContext,
    ) -> Result<Disposition, EngineError> {
        let Some(path) = evaluate_trigger(rule, ctx)? else {
            return Ok(Disposition::NotEligible);
        };

        if !auth::check_user_can_trigger(&self.github, rule, ctx, self.rules.trusted_org()).await {
            return Ok(Disposition::Unauthorized);
        }

        self.dispatch(rule, ctx, path).await
    }

    async fn dispatch(
        &self,
        rule: &Rule,
        ctx: &EventContext,
        path: TriggerPath,
    ) -> Result<Disposition, EngineError> {
        if rule.versions_check
            && stale_branch::check_stale_branch(
                &self.github,
                ctx,
                &self.settings.live_branches_manifest,
                self.settings.bot_login.as_deref(),
            )
            .await
        {
            return Ok(Disposition::Blocked(BlockReason::StaleBranch));
        }

        if skip::should_skip_ci(&self.github, &self.index, rule, ctx).await {
            tracing::info!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                "Skipping CI, only skippable files changed"
            );
            self.report_status(rule, ctx, CommitState::Success, SKIPPED_DESCRIPTION)
                .await;
            return Ok(Disposition::SkippedCi);
        }

        let commit = match resolve_commit(
            &self.github,
            rule,
            ctx,
            self.settings.mergeable_polling,
        )
        .await
        {
            CommitChoice::Build(commit) => commit,
            CommitChoice::NotMergeable => {
                self.report_not_mergeable(rule, ctx).await;
                return Ok(Disposition::Blocked(BlockReason::NotMergeable));
            }
        };

        let reused = reuse::find_reusable_build(&self.github, &self.index, rule, ctx).await;
        let request = build_request(rule, ctx, path, &commit, reused.as_ref());
        let build = dispatch::trigger_build(&self.github, &self.ci, rule, ctx, request).await?;

        Ok(Disposition::Triggered {
            build,
            reused_build: reused.map(|b| b.build_number),
        })
    }

    /// Posts a status on the head commit when the rule reports statuses.
    async fn report_status(
        &self,
        rule: &Rule,
        ctx: &EventContext,
        state: CommitState,
        description: &str,
    ) {
        if !rule.reports_status() {
            return;
        }

        let status = StatusUpdate {
            sha: &ctx.pull_request.head.sha,
            state,
            context: &rule.commit_status_context,
            description,
            target_url: None,
        };
        if let Err(e) = calls::create_status(&self.github, &ctx.repo, status).await {
            tracing::error!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Failed to create commit status"
            );
        }
    }

    async fn report_not_mergeable(&self, rule: &Rule, ctx: &EventContext) {
        tracing::info!(
            repo = %ctx.repo,
            pr = %ctx.pull_request.number,
            pipeline = %rule.pipeline_slug,
            "Blocking build for PR that is not mergeable"
        );

        if rule.reports_status() {
            self.report_status(rule, ctx, CommitState::Failure, NOT_MERGEABLE_DESCRIPTION)
                .await;
            return;
        }

        let body = NOT_MERGEABLE_COMMENT.to_string();
        if let Err(e) =
            calls::post_comment(&self.github, &ctx.repo, ctx.pull_request.number, body).await
        {
            tracing::error!(
                repo = %ctx.repo,
                pr = %ctx.pull_request.number,
                pipeline = %rule.pipeline_slug,
                error = %e,
                "Failed to post not-mergeable comment"
            );
        }
    }
}
