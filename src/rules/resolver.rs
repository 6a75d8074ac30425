//! Resolves the ordered rule list for a repository.
//!
//! Org-wide rules that list the repository come first, followed by the
//! repository's own rule file. Fetched files are cached for a short TTL so a
//! burst of webhooks for one repository costs one API call per file.

use std::fmt::Display;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::RepoId;

use super::cache::{Clock, RULE_CACHE_TTL, TtlCache};
use super::error::RuleConfigError;
use super::location::{FALLBACK_CONFIG_BRANCH, FileLocation, RepoMappings, RuleSource};
use super::rule::{Rule, parse_rules_file};

/// Rule configuration service.
pub struct RuleConfig {
    mappings: RepoMappings,
    org_wide: Vec<FileLocation>,
    trusted_org: String,
    cache: TtlCache<String, Vec<Rule>>,
}

impl RuleConfig {
    pub fn new(
        mappings: RepoMappings,
        org_wide: Vec<FileLocation>,
        trusted_org: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mappings,
            org_wide,
            trusted_org: trusted_org.into(),
            cache: TtlCache::new(RULE_CACHE_TTL, clock),
        }
    }

    pub fn trusted_org(&self) -> &str {
        &self.trusted_org
    }

    /// Whether `repo` has a mapping or belongs to the trusted org.
    pub fn is_known(&self, repo: &RepoId) -> bool {
        self.mappings.is_known(repo, &self.trusted_org)
    }

    /// Returns the rules that apply to `repo`, in evaluation order.
    ///
    /// A repository with no rule source has no rules. A failure to read the
    /// repository's own rule file is an error; a failure to read an org-wide
    /// file is logged and that file contributes nothing.
    pub async fn get_rules_for<G>(
        &self,
        github: &G,
        repo: &RepoId,
    ) -> Result<Vec<Rule>, RuleConfigError>
    where
        G: GitHubInterpreter + Sync,
        G::Error: Display,
    {
        let Some(source) = self.mappings.source_for(repo, &self.trusted_org) else {
            tracing::debug!(repo = %repo, "No rule source for repository");
            return Ok(Vec::new());
        };

        let full_name = repo.full_name();
        let mut rules: Vec<Rule> = self
            .org_wide_rules(github)
            .await
            .into_iter()
            .filter(|rule| rule.applies_to_repository(&full_name))
            .collect();

        rules.extend(self.repo_rules(github, &source).await?);
        Ok(rules)
    }

    async fn repo_rules<G>(&self, github: &G, source: &RuleSource) -> Result<Vec<Rule>, RuleConfigError>
    where
        G: GitHubInterpreter + Sync,
        G::Error: Display,
    {
        let key = format!("{}:{}:{}", source.repo, source.branch, source.path);
        if let Some(rules) = self.cache.get(&key).await {
            return Ok(rules);
        }

        let rules = match fetch_rules(github, &source.repo, &source.branch, &source.path).await {
            Err(RuleConfigError::Fetch { message, .. }) if source.is_default => {
                tracing::info!(
                    repo = %source.repo,
                    branch = %source.branch,
                    error = %message,
                    "Rule file not readable, retrying on {}",
                    FALLBACK_CONFIG_BRANCH
                );
                fetch_rules(github, &source.repo, FALLBACK_CONFIG_BRANCH, &source.path).await?
            }
            other => other?,
        };

        self.cache.insert(key, rules.clone()).await;
        Ok(rules)
    }

    /// Fetches every org-wide rule file in parallel.
    async fn org_wide_rules<G>(&self, github: &G) -> Vec<Rule>
    where
        G: GitHubInterpreter + Sync,
        G::Error: Display,
    {
        let fetches = self.org_wide.iter().map(|locator| self.org_wide_file(github, locator));
        join_all(fetches).await.into_iter().flatten().collect()
    }

    async fn org_wide_file<G>(&self, github: &G, locator: &FileLocation) -> Vec<Rule>
    where
        G: GitHubInterpreter + Sync,
        G::Error: Display,
    {
        let key = locator.cache_key();
        if let Some(rules) = self.cache.get(&key).await {
            return rules;
        }

        match fetch_rules(github, &locator.repo, &locator.branch, &locator.path).await {
            Ok(rules) => {
                self.cache.insert(key, rules.clone()).await;
                rules
            }
            Err(e) => {
                tracing::error!(location = %key, error = %e, "Failed to load org-wide rules");
                Vec::new()
            }
        }
    }
}

/// Reads and parses one rule file.
async fn fetch_rules<G>(
    github: &G,
    repo: &RepoId,
    branch: &str,
    path: &str,
) -> Result<Vec<Rule>, RuleConfigError>
where
    G: GitHubInterpreter + Sync,
    G::Error: Display,
{
    let effect = GitHubEffect::GetFileContent {
        repo: repo.clone(),
        git_ref: branch.to_string(),
        path: path.to_string(),
    };

    let encoded = match github.interpret(effect).await {
        Ok(GitHubResponse::FileContent(content)) => content,
        Ok(other) => {
            return Err(RuleConfigError::UnexpectedResponse(format!("{other:?}")));
        }
        Err(e) => {
            return Err(RuleConfigError::Fetch {
                repo: repo.clone(),
                branch: branch.to_string(),
                path: path.to_string(),
                message: e.to_string(),
            });
        }
    };

    let json = decode_content(&encoded).map_err(|message| RuleConfigError::Decode {
        repo: repo.clone(),
        path: path.to_string(),
        message,
    })?;

    parse_rules_file(&json).map_err(|source| RuleConfigError::Json {
        repo: repo.clone(),
        path: path.to_string(),
        source,
    })
}

/// Decodes the contents API's base64, which is wrapped at 60 columns.
pub fn decode_content(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::cache::ManualClock;
    use crate::test_utils::{MockGitHub, file_response};
    use std::time::Duration;

    fn config(org_wide: &str, clock: Arc<ManualClock>) -> RuleConfig {
        RuleConfig::new(
            RepoMappings::from_json(
                r#"{"repos": [{"owner": "partner", "repo": "plugin", "configBranch": "ci"}]}"#,
            )
            .unwrap(),
            FileLocation::parse_org_wide_list(org_wide).unwrap(),
            "elastic",
            clock,
        )
    }

    const REPO_FILE: &str = r#"{"jobs": [{"pipelineSlug": "local", "enabled": true}]}"#;
    const ORG_FILE: &str = r#"{"jobs": [
        {"pipelineSlug": "org-kibana", "repositories": ["elastic/kibana"]},
        {"pipelineSlug": "org-other", "repositories": ["elastic/other"]}
    ]}"#;

    fn path_of(effect: &GitHubEffect) -> Option<(String, String)> {
        match effect {
            GitHubEffect::GetFileContent { git_ref, path, .. } => {
                Some((git_ref.clone(), path.clone()))
            }
            _ => None,
        }
    }

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = "eyJqb2JzIjog\nW119\n";
        assert_eq!(decode_content(encoded).unwrap(), r#"{"jobs": []}"#);
        assert!(decode_content("!!!").is_err());
    }

    #[tokio::test]
    async fn unknown_repository_has_no_rules() {
        let github = MockGitHub::new(|_| panic!("no API call expected"));
        let config = config("", Arc::new(ManualClock::new()));

        let rules = config
            .get_rules_for(&github, &RepoId::new("stranger", "repo"))
            .await
            .unwrap();
        assert!(rules.is_empty());
        assert!(!config.is_known(&RepoId::new("stranger", "repo")));
    }

    #[tokio::test]
    async fn org_wide_rules_are_filtered_and_prepended() {
        let github = MockGitHub::new(|effect| match path_of(&effect) {
            Some((_, path)) if path.ends_with("org-wide.json") => Ok(file_response(ORG_FILE)),
            Some(_) => Ok(file_response(REPO_FILE)),
            None => panic!("unexpected effect {effect:?}"),
        });
        let config = config("elastic/ci-config", Arc::new(ManualClock::new()));

        let rules = config
            .get_rules_for(&github, &RepoId::new("elastic", "kibana"))
            .await
            .unwrap();
        let slugs: Vec<&str> = rules.iter().map(|r| r.pipeline_slug.as_str()).collect();
        assert_eq!(slugs, vec!["org-kibana", "local"]);
    }

    #[tokio::test]
    async fn failing_org_wide_source_contributes_nothing() {
        let github = MockGitHub::new(|effect| match path_of(&effect) {
            Some((_, path)) if path.ends_with("org-wide.json") => Err("boom".to_string()),
            Some(_) => Ok(file_response(REPO_FILE)),
            None => panic!("unexpected effect {effect:?}"),
        });
        let config = config("elastic/ci-config", Arc::new(ManualClock::new()));

        let rules = config
            .get_rules_for(&github, &RepoId::new("elastic", "kibana"))
            .await
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pipeline_slug, "local");
    }

    #[tokio::test]
    async fn default_source_falls_back_to_master_once() {
        let github = MockGitHub::new(|effect| match path_of(&effect) {
            Some((branch, _)) if branch == "master" => Ok(file_response(REPO_FILE)),
            Some(_) => Err("404 Not Found".to_string()),
            None => panic!("unexpected effect {effect:?}"),
        });
        let config = config("", Arc::new(ManualClock::new()));

        let rules = config
            .get_rules_for(&github, &RepoId::new("elastic", "kibana"))
            .await
            .unwrap();
        assert_eq!(rules.len(), 1);

        let branches: Vec<String> = github
            .calls()
            .iter()
            .filter_map(path_of)
            .map(|(branch, _)| branch)
            .collect();
        assert_eq!(branches, vec!["main", "master"]);
    }

    #[tokio::test]
    async fn mapped_source_does_not_fall_back() {
        let github = MockGitHub::new(|_| Err("404 Not Found".to_string()));
        let config = config("", Arc::new(ManualClock::new()));

        let err = config
            .get_rules_for(&github, &RepoId::new("partner", "plugin"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::Fetch { ref branch, .. } if branch == "ci"));
        assert_eq!(github.calls().len(), 1);
    }

    #[tokio::test]
    async fn malformed_rule_file_is_rejected() {
        let github = MockGitHub::new(|_| Ok(file_response("{ not json")));
        let config = config("", Arc::new(ManualClock::new()));

        let err = config
            .get_rules_for(&github, &RepoId::new("elastic", "kibana"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuleConfigError::Json { .. }));
    }

    #[tokio::test]
    async fn rule_files_are_cached_until_ttl() {
        let clock = Arc::new(ManualClock::new());
        let github = MockGitHub::new(|effect| match path_of(&effect) {
            Some((_, path)) if path.ends_with("org-wide.json") => Ok(file_response(ORG_FILE)),
            Some(_) => Ok(file_response(REPO_FILE)),
            None => panic!("unexpected effect {effect:?}"),
        });
        let config = config("elastic/ci-config", clock.clone());
        let repo = RepoId::new("elastic", "kibana");

        config.get_rules_for(&github, &repo).await.unwrap();
        config.get_rules_for(&github, &repo).await.unwrap();
        assert_eq!(github.calls().len(), 2);

        clock.advance(RULE_CACHE_TTL + Duration::from_secs(1));
        config.get_rules_for(&github, &repo).await.unwrap();
        assert_eq!(github.calls().len(), 4);
    }

    #[tokio::test]
    async fn org_wide_failures_are_not_cached() {
        let clock = Arc::new(ManualClock::new());
        let github = MockGitHub::new(|effect| match path_of(&effect) {
            Some((_, path)) if path.ends_with("org-wide.json") => Err("502".to_string()),
            Some(_) => Ok(file_response(REPO_FILE)),
            None => panic!("unexpected effect {effect:?}"),
        });
        let config = config("elastic/ci-config", clock);
        let repo = RepoId::new("elastic", "kibana");

        config.get_rules_for(&github, &repo).await.unwrap();
        config.get_rules_for(&github, &repo).await.unwrap();

        let org_wide_calls = github
            .calls()
            .iter()
            .filter_map(path_of)
            .filter(|(_, path)| path.ends_with("org-wide.json"))
            .count();
        assert_eq!(org_wide_calls, 2);
    }
}
