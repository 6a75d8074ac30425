//! Reqwest client for the build-result index.

use crate::effects::{IndexEffect, IndexInterpreter, IndexResponse};
use crate::types::{ReusableBuild, Sha};

use super::error::SearchError;
use super::query::{SearchResponse, build_jobs_query, into_builds};

pub const DEFAULT_JOBS_INDEX: &str = "buildkite-jobs";

/// Connection details for the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEndpoint {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index: String,
}

/// Build-result index client. Without an endpoint every search finds nothing.
#[derive(Debug)]
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: Option<SearchEndpoint>,
}

impl SearchClient {
    pub fn new(endpoint: Option<SearchEndpoint>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// A client that never finds any builds.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub async fn search_build_jobs(
        &self,
        commits: &[Sha],
        pipeline_slugs: &[String],
    ) -> Result<Vec<ReusableBuild>, SearchError> {
        let Some(endpoint) = &self.endpoint else {
            tracing::debug!("No build index configured, skipping search");
            return Ok(Vec::new());
        };

        if commits.is_empty() || pipeline_slugs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/{}/_search",
            endpoint.url.trim_end_matches('/'),
            endpoint.index
        );

        let mut request = self
            .http
            .post(&url)
            .json(&build_jobs_query(commits, pipeline_slugs));
        if let Some(username) = &endpoint.username {
            request = request.basic_auth(username, endpoint.password.as_ref());
        }

        let response = request.send().await.map_err(|source| SearchError::Http {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|source| SearchError::Decode { url, source })?;
        Ok(into_builds(parsed))
    }
}

impl IndexInterpreter for SearchClient {
    type Error = SearchError;

    async fn interpret(&self, effect: IndexEffect) -> Result<IndexResponse, Self::Error> {
        match effect {
            IndexEffect::SearchBuildJobs {
                commits,
                pipeline_slugs,
            } => self
                .search_build_jobs(&commits, &pipeline_slugs)
                .await
                .map(IndexResponse::Jobs),
        }
    }
}
