//! The build rule and its defaulting.
//!
//! Rule files are JSON documents shaped as `{ "jobs": [RuleRecord, ...] }`.
//! A `RuleRecord` may carry any subset of fields; `resolve_rule` fills in the
//! rest so the engine only ever sees fully populated `Rule`s.

use serde::{Deserialize, Serialize};

/// Trigger phrase used when a rule does not configure one.
pub const DEFAULT_TRIGGER_COMMENT_REGEX: &str =
    r"^(?:(?:buildkite\W+)?(?:build|test)\W+(?:this|it))|^retest$";

/// Skip-CI label used when a rule configures neither the legacy nor the list form.
pub const DEFAULT_SKIP_CI_LABEL: &str = "skip-ci";

/// A fully resolved build rule for one CI pipeline on one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    // ─── Identity ─────────────────────────────────────────────────────────────
    pub pipeline_slug: String,
    pub repo_owner: String,
    pub repo_name: String,
    /// `owner/repo` names an org-wide rule applies to. Unused for repo-local rules.
    pub repositories: Vec<String>,

    // ─── Triggering ───────────────────────────────────────────────────────────
    pub enabled: bool,
    pub build_on_comment: bool,
    pub build_on_commit: bool,
    pub trigger_comment_regex: String,
    pub trigger_comment_regex_flags: Option<String>,
    /// Empty means the rule has no always-trigger phrase.
    pub always_trigger_comment_regex: String,
    pub always_trigger_comment_regex_flags: Option<String>,
    /// Branch to build instead of the PR head when fired by the always-trigger phrase.
    pub always_trigger_branch: Option<String>,

    // ─── Branch and label gating ──────────────────────────────────────────────
    /// Empty means any base branch.
    pub target_branches: Vec<String>,
    pub skip_target_branches: Vec<String>,
    /// Empty means no label is required.
    pub labels: Vec<String>,
    pub skip_ci_labels: Vec<String>,

    // ─── Path-based skipping ──────────────────────────────────────────────────
    pub skip_ci_on_only_changed: Vec<String>,
    pub always_require_ci_on_changed: Vec<String>,
    pub enable_skippable_commits: bool,
    pub skippable_commits_label: Option<String>,

    // ─── Authorization ────────────────────────────────────────────────────────
    pub allowed_list: Vec<String>,
    pub allowed_repo_permissions: Vec<String>,
    pub allow_org_users: bool,

    // ─── Build reuse ──────────────────────────────────────────────────────────
    pub build_reuse: bool,
    pub build_reuse_pipeline_slugs: Vec<String>,
    pub build_reuse_regexes: Vec<String>,
    pub build_reuse_label: Option<String>,

    // ─── Commit selection ─────────────────────────────────────────────────────
    pub use_merge_commit: bool,
    pub fail_on_not_mergeable: bool,

    // ─── Cancellation ─────────────────────────────────────────────────────────
    pub cancel_intermediate_builds: bool,
    pub cancel_intermediate_builds_on_comment: bool,

    // ─── Branch liveness and status ───────────────────────────────────────────
    pub versions_check: bool,
    pub set_commit_status: bool,
    pub commit_status_context: String,
}

impl Rule {
    /// Whether pending/skip/failure statuses should be posted for this rule.
    pub fn reports_status(&self) -> bool {
        self.set_commit_status && !self.commit_status_context.is_empty()
    }

    /// Whether the rule applies to `owner/repo` as an org-wide rule.
    pub fn applies_to_repository(&self, full_name: &str) -> bool {
        self.repositories.iter().any(|r| r == full_name)
    }
}

/// One or many strings, as `target_branch` accepts either form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flattens to a list, dropping empty entries.
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        };
        items.into_iter().filter(|s| !s.is_empty()).collect()
    }
}

/// A rule as written in a rule file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(rename = "pipelineSlug")]
    pub pipeline_slug: Option<String>,
    #[serde(rename = "repoOwner")]
    pub repo_owner: Option<String>,
    #[serde(rename = "repoName")]
    pub repo_name: Option<String>,
    pub repositories: Option<Vec<String>>,

    pub enabled: Option<bool>,
    pub build_on_comment: Option<bool>,
    pub build_on_commit: Option<bool>,
    pub trigger_comment_regex: Option<String>,
    pub trigger_comment_regex_flags: Option<String>,
    pub always_trigger_comment_regex: Option<String>,
    pub always_trigger_comment_regex_flags: Option<String>,
    pub always_trigger_branch: Option<String>,

    pub target_branch: Option<OneOrMany>,
    pub skip_target_branches: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    /// Legacy singular form of `skip_ci_labels`. Wins when non-empty.
    pub skip_ci_label: Option<String>,
    pub skip_ci_labels: Option<Vec<String>>,

    pub skip_ci_on_only_changed: Option<Vec<String>>,
    pub always_require_ci_on_changed: Option<Vec<String>>,
    pub enable_skippable_commits: Option<bool>,
    pub skippable_commits_label: Option<String>,

    pub allowed_list: Option<Vec<String>>,
    pub allowed_repo_permissions: Option<Vec<String>>,
    pub allow_org_users: Option<bool>,

    #[serde(rename = "kibana_build_reuse")]
    pub build_reuse: Option<bool>,
    #[serde(rename = "kibana_build_reuse_pipeline_slugs")]
    pub build_reuse_pipeline_slugs: Option<Vec<String>>,
    #[serde(rename = "kibana_build_reuse_regexes")]
    pub build_reuse_regexes: Option<Vec<String>>,
    #[serde(rename = "kibana_build_reuse_label")]
    pub build_reuse_label: Option<String>,

    pub use_merge_commit: Option<bool>,
    #[serde(rename = "fail_on_not_mergable")]
    pub fail_on_not_mergeable: Option<bool>,

    pub cancel_intermediate_builds: Option<bool>,
    pub cancel_intermediate_builds_on_comment: Option<bool>,

    #[serde(rename = "kibana_versions_check")]
    pub versions_check: Option<bool>,
    pub set_commit_status: Option<bool>,
    pub commit_status_context: Option<String>,
}

/// The top-level shape of a rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub jobs: Vec<RuleRecord>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Fills every unset field of `record` with its default, then folds the
/// legacy `skip_ci_label` into `skip_ci_labels`.
pub fn resolve_rule(record: RuleRecord) -> Rule {
    let skip_ci_labels = match non_empty(record.skip_ci_label) {
        Some(legacy) => vec![legacy],
        None => record
            .skip_ci_labels
            .unwrap_or_else(|| vec![DEFAULT_SKIP_CI_LABEL.to_string()]),
    };

    Rule {
        pipeline_slug: record.pipeline_slug.unwrap_or_default(),
        repo_owner: record.repo_owner.unwrap_or_default(),
        repo_name: record.repo_name.unwrap_or_default(),
        repositories: record.repositories.unwrap_or_default(),

        enabled: record.enabled.unwrap_or(false),
        build_on_comment: record.build_on_comment.unwrap_or(true),
        build_on_commit: record.build_on_commit.unwrap_or(true),
        trigger_comment_regex: record
            .trigger_comment_regex
            .unwrap_or_else(|| DEFAULT_TRIGGER_COMMENT_REGEX.to_string()),
        trigger_comment_regex_flags: record.trigger_comment_regex_flags,
        always_trigger_comment_regex: record.always_trigger_comment_regex.unwrap_or_default(),
        always_trigger_comment_regex_flags: record.always_trigger_comment_regex_flags,
        always_trigger_branch: non_empty(record.always_trigger_branch),

        target_branches: record
            .target_branch
            .map(OneOrMany::into_vec)
            .unwrap_or_default(),
        skip_target_branches: record.skip_target_branches.unwrap_or_default(),
        labels: record.labels.unwrap_or_default(),
        skip_ci_labels,

        skip_ci_on_only_changed: record.skip_ci_on_only_changed.unwrap_or_default(),
        always_require_ci_on_changed: record.always_require_ci_on_changed.unwrap_or_default(),
        enable_skippable_commits: record.enable_skippable_commits.unwrap_or(false),
        skippable_commits_label: non_empty(record.skippable_commits_label),

        allowed_list: record.allowed_list.unwrap_or_default(),
        allowed_repo_permissions: record.allowed_repo_permissions.unwrap_or_default(),
        allow_org_users: record.allow_org_users.unwrap_or(false),

        build_reuse: record.build_reuse.unwrap_or(false),
        build_reuse_pipeline_slugs: record.build_reuse_pipeline_slugs.unwrap_or_default(),
        build_reuse_regexes: record.build_reuse_regexes.unwrap_or_default(),
        build_reuse_label: non_empty(record.build_reuse_label),

        use_merge_commit: record.use_merge_commit.unwrap_or(false),
        fail_on_not_mergeable: record.fail_on_not_mergeable.unwrap_or(false),

        cancel_intermediate_builds: record.cancel_intermediate_builds.unwrap_or(false),
        cancel_intermediate_builds_on_comment: record
            .cancel_intermediate_builds_on_comment
            .unwrap_or(false),

        versions_check: record.versions_check.unwrap_or(false),
        set_commit_status: record.set_commit_status.unwrap_or(false),
        commit_status_context: record.commit_status_context.unwrap_or_default(),
    }
}

/// Parses a rule file and resolves every record.
pub fn parse_rules_file(json: &str) -> Result<Vec<Rule>, serde_json::Error> {
    let file: RulesFile = serde_json::from_str(json)?;
    Ok(file.jobs.into_iter().map(resolve_rule).collect())
}
