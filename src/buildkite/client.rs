//! Reqwest client for the build-orchestration REST API.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;

use crate::effects::{BuildRequest, CiEffect, CiInterpreter, CiResponse};
use crate::types::CiBuild;

use super::error::BuildkiteError;

pub const DEFAULT_BASE_URL: &str = "https://api.buildkite.com";

/// States listed when looking for builds that a newer build supersedes.
const RUNNING_STATES: [&str; 3] = ["scheduled", "running", "failing"];

/// Orchestration API client scoped to one organization.
#[derive(Debug)]
pub struct BuildkiteClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    org: String,
    /// When set, builds are logged instead of created.
    dry_run: bool,
    dry_run_counter: AtomicU64,
}

impl BuildkiteClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            org: org.into(),
            dry_run: false,
            dry_run_counter: AtomicU64::new(0),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// URL of a pipeline's builds collection.
    pub fn builds_url(&self, pipeline: &str) -> String {
        format!(
            "{}/v2/organizations/{}/pipelines/{}/builds",
            self.base_url, self.org, pipeline
        )
    }

    /// URL listing a branch's running builds.
    pub fn running_builds_url(&self, pipeline: &str, branch: &str) -> String {
        let states: String = RUNNING_STATES
            .iter()
            .map(|s| format!("&state[]={s}"))
            .collect();
        format!(
            "{}?branch={}{}",
            self.builds_url(pipeline),
            urlencoding::encode(branch),
            states
        )
    }

    pub fn cancel_url(&self, pipeline: &str, number: u64) -> String {
        format!("{}/{}/cancel", self.builds_url(pipeline), number)
    }

    pub async fn trigger_build(
        &self,
        pipeline: &str,
        request: &BuildRequest,
    ) -> Result<CiBuild, BuildkiteError> {
        if self.dry_run {
            let number = self.dry_run_counter.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!(
                pipeline,
                branch = %request.branch,
                commit = %request.commit,
                env = ?request.env,
                "Dry run: not triggering build"
            );
            return Ok(CiBuild {
                id: format!("dry-run-{number}"),
                number,
                url: String::new(),
                web_url: String::new(),
                state: "scheduled".to_string(),
                commit: request.commit.clone(),
            });
        }

        let url = self.builds_url(pipeline);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|source| BuildkiteError::Http {
                url: url.clone(),
                source,
            })?;
        decode(url, response).await
    }

    pub async fn running_builds(
        &self,
        pipeline: &str,
        branch: &str,
    ) -> Result<Vec<CiBuild>, BuildkiteError> {
        let url = self.running_builds_url(pipeline, branch);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| BuildkiteError::Http {
                url: url.clone(),
                source,
            })?;
        decode(url, response).await
    }

    pub async fn cancel_build(&self, pipeline: &str, number: u64) -> Result<(), BuildkiteError> {
        if self.dry_run {
            tracing::info!(pipeline, number, "Dry run: not cancelling build");
            return Ok(());
        }

        let url = self.cancel_url(pipeline, number);
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| BuildkiteError::Http {
                url: url.clone(),
                source,
            })?;
        check_status(url, response).await.map(|_| ())
    }
}

async fn check_status(
    url: String,
    response: reqwest::Response,
) -> Result<reqwest::Response, BuildkiteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BuildkiteError::Status {
        url,
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(
    url: String,
    response: reqwest::Response,
) -> Result<T, BuildkiteError> {
    let response = check_status(url.clone(), response).await?;
    response
        .json()
        .await
        .map_err(|source| BuildkiteError::Decode { url, source })
}

impl CiInterpreter for BuildkiteClient {
    type Error = BuildkiteError;

    async fn interpret(&self, effect: CiEffect) -> Result<CiResponse, Self::Error> {
        match effect {
            CiEffect::TriggerBuild { pipeline, request } => self
                .trigger_build(&pipeline, &request)
                .await
                .map(CiResponse::Build),
            CiEffect::ListRunningBuilds { pipeline, branch } => self
                .running_builds(&pipeline, &branch)
                .await
                .map(CiResponse::Builds),
            CiEffect::CancelBuild { pipeline, number } => self
                .cancel_build(&pipeline, number)
                .await
                .map(|()| CiResponse::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn client() -> BuildkiteClient {
        BuildkiteClient::new("https://api.buildkite.com/", "token", "elastic")
    }

    #[test]
    fn urls() {
        let client = client();
        assert_eq!(
            client.builds_url("kibana-pr"),
            "https://api.buildkite.com/v2/organizations/elastic/pipelines/kibana-pr/builds"
        );
        assert_eq!(
            client.cancel_url("kibana-pr", 17),
            "https://api.buildkite.com/v2/organizations/elastic/pipelines/kibana-pr/builds/17/cancel"
        );
    }

    #[test]
    fn running_builds_url_encodes_branch() {
        assert_eq!(
            client().running_builds_url("kibana-pr", "contributor:fix/thing"),
            "https://api.buildkite.com/v2/organizations/elastic/pipelines/kibana-pr/builds\
             ?branch=contributor%3Afix%2Fthing&state[]=scheduled&state[]=running&state[]=failing"
        );
    }

    #[tokio::test]
    async fn dry_run_returns_fake_build() {
        let client = client().with_dry_run(true);
        let request = BuildRequest {
            branch: "contributor:fix".to_string(),
            commit: "abc123".to_string(),
            pull_request_base_branch: "main".to_string(),
            pull_request_id: 42,
            pull_request_repository: None,
            env: BTreeMap::new(),
        };

        let first = client.trigger_build("kibana-pr", &request).await.unwrap();
        let second = client.trigger_build("kibana-pr", &request).await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(first.commit, "abc123");

        let response = client
            .interpret(CiEffect::CancelBuild {
                pipeline: "kibana-pr".to_string(),
                number: 1,
            })
            .await
            .unwrap();
        assert_eq!(response, CiResponse::Cancelled);
    }

    #[test]
    fn build_request_body_shape() {
        let mut env = BTreeMap::new();
        env.insert("GITHUB_PR_NUMBER".to_string(), "42".to_string());
        let request = BuildRequest {
            branch: "contributor:fix".to_string(),
            commit: "abc123".to_string(),
            pull_request_base_branch: "main".to_string(),
            pull_request_id: 42,
            pull_request_repository: Some("git://github.com/contributor/kibana.git".to_string()),
            env,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["branch"], "contributor:fix");
        assert_eq!(json["pull_request_id"], 42);
        assert_eq!(json["env"]["GITHUB_PR_NUMBER"], "42");
        assert_eq!(
            json["pull_request_repository"],
            "git://github.com/contributor/kibana.git"
        );
    }
}
