//! Query and response shapes for the job index.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::types::{ReusableBuild, Sha};

/// Only the job that produced the build artifacts is worth reusing.
pub const BUILD_STEP_KEY: &str = "build";

/// Upper bound on hits returned for one query.
pub const MAX_HITS: usize = 100;

/// Builds the `_search` body: passed jobs on any of `commits` and
/// `pipeline_slugs`, from the build step, newest first.
pub fn build_jobs_query(commits: &[Sha], pipeline_slugs: &[String]) -> Value {
    let commits: Vec<&str> = commits.iter().map(Sha::as_str).collect();

    json!({
        "size": MAX_HITS,
        "sort": [{ "created_at": "desc" }],
        "query": {
            "bool": {
                "must": [
                    { "terms": { "build.commit.keyword": commits } },
                    { "match": { "step_key.keyword": BUILD_STEP_KEY } },
                    { "terms": { "pipeline.slug.keyword": pipeline_slugs } },
                    { "term": { "state.keyword": "passed" } }
                ]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub hits: Hits,
}

#[derive(Debug, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
pub struct Hit {
    #[serde(rename = "_source")]
    pub source: JobDocument,
}

/// A job document as ingested from the orchestration service.
#[derive(Debug, Deserialize)]
pub struct JobDocument {
    pub id: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub web_url: Option<String>,
    pub build: JobBuild,
    pub pipeline: JobPipeline,
}

#[derive(Debug, Deserialize)]
pub struct JobBuild {
    pub id: String,
    pub number: u64,
    pub commit: String,
    #[serde(default)]
    pub branch: String,
}

#[derive(Debug, Deserialize)]
pub struct JobPipeline {
    pub slug: String,
}

impl From<JobDocument> for ReusableBuild {
    fn from(doc: JobDocument) -> Self {
        ReusableBuild {
            job_id: doc.id,
            build_id: doc.build.id,
            build_number: doc.build.number,
            branch: doc.build.branch,
            commit: Sha::new(doc.build.commit),
            state: doc.state,
            pipeline_slug: doc.pipeline.slug,
            created_at: doc.created_at,
            web_url: doc.web_url,
        }
    }
}

/// Flattens a search response into builds, newest first.
pub fn into_builds(response: SearchResponse) -> Vec<ReusableBuild> {
    let mut builds: Vec<ReusableBuild> = response
        .hits
        .hits
        .into_iter()
        .map(|hit| ReusableBuild::from(hit.source))
        .collect();
    builds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    builds
}
