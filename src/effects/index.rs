//! Build-result index effect types.

use serde::{Deserialize, Serialize};

use crate::types::{ReusableBuild, Sha};

/// A build-result index query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexEffect {
    /// Find build jobs whose commit is one of `commits` on one of
    /// `pipeline_slugs`, newest first.
    SearchBuildJobs {
        commits: Vec<Sha>,
        pipeline_slugs: Vec<String>,
    },
}

/// Response from a build-result index query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum IndexResponse {
    /// Response to `SearchBuildJobs`.
    Jobs(Vec<ReusableBuild>),
}
