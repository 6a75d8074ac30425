//! Process configuration, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::buildkite::DEFAULT_BASE_URL;
use crate::intake::DEFAULT_SETTLE_DELAY;
use crate::rules::{FileLocation, RepoMappings, RuleConfigError};
use crate::search::{DEFAULT_JOBS_INDEX, SearchEndpoint};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TRUSTED_ORG: &str = "elastic";
const DEFAULT_BUILDKITE_ORG: &str = "elastic";
const DEFAULT_MANIFEST_BRANCH: &str = "main";
const DEFAULT_MANIFEST_PATH: &str = "versions.json";

/// Errors in the process environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("failed to read repository mappings from {path}: {source}")]
    MappingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid repository mappings in {path}: {source}")]
    MappingsJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {var}: {source}")]
    Location {
        var: &'static str,
        #[source]
        source: RuleConfigError,
    },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub github_token: String,
    pub webhook_secret: String,
    pub port: u16,
    pub trusted_org: String,
    pub repo_mappings: RepoMappings,
    pub org_wide_configs: Vec<FileLocation>,
    pub buildkite_base_url: String,
    pub buildkite_token: String,
    pub buildkite_org: String,
    /// `None` when no build index is configured.
    pub search: Option<SearchEndpoint>,
    pub live_branches_manifest: FileLocation,
    pub settle_delay: Duration,
    pub bot_login: Option<String>,
    pub dry_run: bool,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = match get("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let trusted_org = get("TRUSTED_ORG").unwrap_or_else(|| DEFAULT_TRUSTED_ORG.to_string());

        let repo_mappings = match get("APP_CONFIG") {
            Some(path) => load_mappings(PathBuf::from(path))?,
            None => RepoMappings::default(),
        };

        let org_wide_configs = match get("ORG_WIDE_CONFIGS") {
            Some(list) => FileLocation::parse_org_wide_list(&list).map_err(|source| {
                ConfigError::Location {
                    var: "ORG_WIDE_CONFIGS",
                    source,
                }
            })?,
            None => Vec::new(),
        };

        let search = get("ES_URL").map(|url| SearchEndpoint {
            url,
            username: get("ES_USERNAME"),
            password: get("ES_PASSWORD"),
            index: get("ES_JOBS_INDEX").unwrap_or_else(|| DEFAULT_JOBS_INDEX.to_string()),
        });

        let manifest_locator =
            get("LIVE_BRANCHES_MANIFEST").unwrap_or_else(|| format!("{trusted_org}/kibana"));
        let live_branches_manifest = FileLocation::parse_with_defaults(
            &manifest_locator,
            DEFAULT_MANIFEST_BRANCH,
            DEFAULT_MANIFEST_PATH,
        )
        .map_err(|source| ConfigError::Location {
            var: "LIVE_BRANCHES_MANIFEST",
            source,
        })?;

        let dry_run = get("DRY_RUN").is_some();

        let settle_delay = match get("PR_SETTLE_DELAY_SECS") {
            _ if dry_run => Duration::ZERO,
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    var: "PR_SETTLE_DELAY_SECS",
                    value,
                })?,
            None => DEFAULT_SETTLE_DELAY,
        };

        Ok(AppConfig {
            github_token: require("GITHUB_TOKEN")?,
            webhook_secret: require("WEBHOOK_SECRET")?,
            port,
            trusted_org,
            repo_mappings,
            org_wide_configs,
            buildkite_base_url: get("BUILDKITE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            buildkite_token: require("BUILDKITE_TOKEN")?,
            buildkite_org: get("BUILDKITE_ORG").unwrap_or_else(|| DEFAULT_BUILDKITE_ORG.to_string()),
            search,
            live_branches_manifest,
            settle_delay,
            bot_login: get("BOT_LOGIN"),
            dry_run,
        })
    }
}

fn load_mappings(path: PathBuf) -> Result<RepoMappings, ConfigError> {
    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(source) => return Err(ConfigError::MappingsRead { path, source }),
    };
    RepoMappings::from_json(&json).map_err(|source| ConfigError::MappingsJson { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::types::RepoId;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let mut env: HashMap<String, String> = [
            ("GITHUB_TOKEN", "gh-token"),
            ("WEBHOOK_SECRET", "hook-secret"),
            ("BUILDKITE_TOKEN", "bk-token"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in vars {
            env.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.trusted_org, "elastic");
        assert_eq!(config.repo_mappings, RepoMappings::default());
        assert!(config.org_wide_configs.is_empty());
        assert_eq!(config.buildkite_base_url, "https://api.buildkite.com");
        assert_eq!(config.buildkite_org, "elastic");
        assert_eq!(config.search, None);
        assert_eq!(config.live_branches_manifest.repo, RepoId::new("elastic", "kibana"));
        assert_eq!(config.live_branches_manifest.branch, "main");
        assert_eq!(config.live_branches_manifest.path, "versions.json");
        assert_eq!(config.settle_delay, Duration::from_secs(10));
        assert_eq!(config.bot_login, None);
        assert!(!config.dry_run);
    }

    #[test]
    fn required_variables() {
        for var in ["GITHUB_TOKEN", "WEBHOOK_SECRET", "BUILDKITE_TOKEN"] {
            let result = config(&[(var, "")]);
            assert!(
                matches!(result, Err(ConfigError::Missing(name)) if name == var),
                "{var}"
            );
        }
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("TRUSTED_ORG", "acme"),
            ("ORG_WIDE_CONFIGS", "acme/ci-config, acme/other:prod:rules.json"),
            ("ES_URL", "https://es.example.com"),
            ("ES_USERNAME", "reader"),
            ("PR_SETTLE_DELAY_SECS", "0"),
            ("BOT_LOGIN", "acme-ci"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.live_branches_manifest.repo, RepoId::new("acme", "kibana"));
        assert_eq!(config.org_wide_configs.len(), 2);
        assert_eq!(config.org_wide_configs[1].branch, "prod");
        assert_eq!(config.org_wide_configs[1].path, "rules.json");

        let search = config.search.unwrap();
        assert_eq!(search.url, "https://es.example.com");
        assert_eq!(search.username.as_deref(), Some("reader"));
        assert_eq!(search.password, None);
        assert_eq!(search.index, "buildkite-jobs");

        assert_eq!(config.settle_delay, Duration::ZERO);
        assert_eq!(config.bot_login.as_deref(), Some("acme-ci"));
    }

    #[test]
    fn dry_run_skips_settle_delay() {
        let config = config(&[("DRY_RUN", "1"), ("PR_SETTLE_DELAY_SECS", "30")]).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.settle_delay, Duration::ZERO);
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            config(&[("PORT", "http")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("PR_SETTLE_DELAY_SECS", "-1")]),
            Err(ConfigError::Invalid { var: "PR_SETTLE_DELAY_SECS", .. })
        ));
        assert!(matches!(
            config(&[("ORG_WIDE_CONFIGS", "not-a-repo")]),
            Err(ConfigError::Location { var: "ORG_WIDE_CONFIGS", .. })
        ));
    }

    #[test]
    fn missing_mappings_file() {
        let result = config(&[("APP_CONFIG", "/nonexistent/pr-bot/repos.json")]);
        assert!(matches!(result, Err(ConfigError::MappingsRead { .. })));
    }
}
