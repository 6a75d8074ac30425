//! Octocrab client wrapper.
//!
//! One client serves every repository: the effects carry their own `RepoId`.

use octocrab::Octocrab;

use super::retry::RetryConfig;

/// A GitHub API client with retry settings.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    retry_config: RetryConfig,
    /// When set, writes are logged instead of sent.
    dry_run: bool,
}

impl GitHubClient {
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            retry_config: RetryConfig::DEFAULT,
            dry_run: false,
        }
    }

    /// Creates a client authenticated with a personal or installation token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client))
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry_config
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("retry_config", &self.retry_config)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
