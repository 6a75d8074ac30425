//! Where rule files live.
//!
//! Repository mappings say which configuration repo, branch and path holds a
//! repository's rule file. Repositories owned by the trusted org need no
//! mapping; they read their own default location.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::RuleConfigError;
use crate::types::RepoId;

pub const DEFAULT_CONFIG_BRANCH: &str = "main";
/// Branch retried once when a default-sourced repo has no rule file on `main`.
pub const FALLBACK_CONFIG_BRANCH: &str = "master";
pub const DEFAULT_CONFIG_PATH: &str = ".buildkite/pull-requests.json";

pub const DEFAULT_ORG_WIDE_BRANCH: &str = "main";
pub const DEFAULT_ORG_WIDE_PATH: &str = ".buildkite/pull-requests.org-wide.json";

/// An explicit repository-to-rule-file mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMapping {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub config_owner: Option<String>,
    #[serde(default)]
    pub config_repo: Option<String>,
    #[serde(default)]
    pub config_branch: Option<String>,
    #[serde(default)]
    pub config_path: Option<String>,
}

/// The set of explicit mappings, as loaded from the app config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMappings {
    #[serde(default)]
    pub repos: Vec<RepoMapping>,
}

impl RepoMappings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn find(&self, repo: &RepoId) -> Option<&RepoMapping> {
        self.repos
            .iter()
            .find(|m| m.owner == repo.owner && m.repo == repo.repo)
    }

    /// Resolves where `repo`'s rule file lives.
    ///
    /// An explicit mapping wins. Otherwise a repository owned by
    /// `trusted_org` reads its own default location. Anything else has no
    /// rule source.
    pub fn source_for(&self, repo: &RepoId, trusted_org: &str) -> Option<RuleSource> {
        if let Some(mapping) = self.find(repo) {
            return Some(RuleSource {
                repo: RepoId::new(
                    non_empty(&mapping.config_owner).unwrap_or(&mapping.owner),
                    non_empty(&mapping.config_repo).unwrap_or(&mapping.repo),
                ),
                branch: non_empty(&mapping.config_branch)
                    .unwrap_or(DEFAULT_CONFIG_BRANCH)
                    .to_string(),
                path: non_empty(&mapping.config_path)
                    .unwrap_or(DEFAULT_CONFIG_PATH)
                    .to_string(),
                is_default: false,
            });
        }

        (repo.owner == trusted_org).then(|| RuleSource {
            repo: repo.clone(),
            branch: DEFAULT_CONFIG_BRANCH.to_string(),
            path: DEFAULT_CONFIG_PATH.to_string(),
            is_default: true,
        })
    }

    /// Whether events for `repo` can have any rules at all.
    pub fn is_known(&self, repo: &RepoId, trusted_org: &str) -> bool {
        self.source_for(repo, trusted_org).is_some()
    }
}

/// An empty override counts as unset.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// A resolved rule file location for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSource {
    pub repo: RepoId,
    pub branch: String,
    pub path: String,
    /// True when no explicit mapping exists and the trusted-org default applies.
    pub is_default: bool,
}

/// A file in a repository at a branch, written `owner/repo[:branch[:path]]`.
///
/// Used for org-wide rule files and the live-branches manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLocation {
    pub repo: RepoId,
    pub branch: String,
    pub path: String,
}

impl FileLocation {
    /// Parses a locator, filling a missing or empty branch or path from the defaults.
    pub fn parse_with_defaults(
        locator: &str,
        default_branch: &str,
        default_path: &str,
    ) -> Result<Self, RuleConfigError> {
        let mut parts = locator.trim().split(':');
        let repo = parts
            .next()
            .and_then(RepoId::parse_full_name)
            .ok_or_else(|| RuleConfigError::InvalidLocator(locator.to_string()))?;

        let branch = parts
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(default_branch)
            .to_string();
        let path = parts
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(default_path)
            .to_string();

        Ok(FileLocation { repo, branch, path })
    }

    /// Parses an org-wide rule file locator.
    pub fn parse_org_wide(locator: &str) -> Result<Self, RuleConfigError> {
        Self::parse_with_defaults(locator, DEFAULT_ORG_WIDE_BRANCH, DEFAULT_ORG_WIDE_PATH)
    }

    /// Parses a comma-separated list of org-wide locators, skipping blank entries.
    pub fn parse_org_wide_list(list: &str) -> Result<Vec<Self>, RuleConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse_org_wide)
            .collect()
    }

    /// Cache key for this location.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.repo, self.branch, self.path)
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.repo, self.branch, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> RepoMappings {
        RepoMappings::from_json(
            r#"{"repos": [
                {"owner": "elastic", "repo": "kibana", "configBranch": "ci-config"},
                {"owner": "partner", "repo": "plugin", "configOwner": "elastic", "configRepo": "plugin-ci", "configPath": "ci/prs.json"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn explicit_mapping_wins() {
        let source = mappings()
            .source_for(&RepoId::new("elastic", "kibana"), "elastic")
            .unwrap();
        assert_eq!(source.repo, RepoId::new("elastic", "kibana"));
        assert_eq!(source.branch, "ci-config");
        assert_eq!(source.path, DEFAULT_CONFIG_PATH);
        assert!(!source.is_default);
    }

    #[test]
    fn mapping_can_point_at_another_repo() {
        let source = mappings()
            .source_for(&RepoId::new("partner", "plugin"), "elastic")
            .unwrap();
        assert_eq!(source.repo, RepoId::new("elastic", "plugin-ci"));
        assert_eq!(source.branch, DEFAULT_CONFIG_BRANCH);
        assert_eq!(source.path, "ci/prs.json");
    }

    #[test]
    fn empty_overrides_fall_back_to_defaults() {
        let mappings = RepoMappings::from_json(
            r#"{"repos": [
                {"owner": "elastic", "repo": "apm", "configRepo": "", "configBranch": "", "configPath": ""}
            ]}"#,
        )
        .unwrap();

        let source = mappings
            .source_for(&RepoId::new("elastic", "apm"), "elastic")
            .unwrap();
        assert_eq!(source.repo, RepoId::new("elastic", "apm"));
        assert_eq!(source.branch, DEFAULT_CONFIG_BRANCH);
        assert_eq!(source.path, DEFAULT_CONFIG_PATH);
        assert!(!source.is_default);
    }

    #[test]
    fn trusted_org_gets_default_source() {
        let source = mappings()
            .source_for(&RepoId::new("elastic", "elasticsearch"), "elastic")
            .unwrap();
        assert!(source.is_default);
        assert_eq!(source.repo, RepoId::new("elastic", "elasticsearch"));
        assert_eq!(source.branch, "main");
    }

    #[test]
    fn unknown_owner_has_no_source() {
        let repo = RepoId::new("someone", "fork");
        assert_eq!(mappings().source_for(&repo, "elastic"), None);
        assert!(!mappings().is_known(&repo, "elastic"));
    }

    #[test]
    fn locator_defaults() {
        let locator = FileLocation::parse_org_wide("elastic/ci-config").unwrap();
        assert_eq!(locator.repo, RepoId::new("elastic", "ci-config"));
        assert_eq!(locator.branch, DEFAULT_ORG_WIDE_BRANCH);
        assert_eq!(locator.path, DEFAULT_ORG_WIDE_PATH);
        assert_eq!(
            locator.cache_key(),
            "elastic/ci-config:main:.buildkite/pull-requests.org-wide.json"
        );
    }

    #[test]
    fn locator_with_branch_and_path() {
        let locator = FileLocation::parse_org_wide(" elastic/ci:prod:rules/org.json ").unwrap();
        assert_eq!(locator.branch, "prod");
        assert_eq!(locator.path, "rules/org.json");
    }

    #[test]
    fn locator_list_skips_blanks() {
        let locators = FileLocation::parse_org_wide_list("elastic/a, ,elastic/b:dev,").unwrap();
        assert_eq!(locators.len(), 2);
        assert_eq!(locators[1].branch, "dev");
    }

    #[test]
    fn explicit_defaults() {
        let locator =
            FileLocation::parse_with_defaults("elastic/kibana", "main", "versions.json").unwrap();
        assert_eq!(locator.to_string(), "elastic/kibana:main:versions.json");
    }

    #[test]
    fn malformed_locator_is_rejected() {
        assert!(matches!(
            FileLocation::parse_org_wide("no-slash:main"),
            Err(RuleConfigError::InvalidLocator(_))
        ));
    }
}
