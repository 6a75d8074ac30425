//! Build records exchanged with the orchestration service and the
//! build-result index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::Sha;

/// A build as reported by the orchestration service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiBuild {
    pub id: String,
    pub number: u64,
    /// API URL of the build.
    #[serde(default)]
    pub url: String,
    /// Human-facing URL of the build.
    #[serde(default)]
    pub web_url: String,
    pub state: String,
    #[serde(default)]
    pub commit: String,
}

/// A previously completed build job found in the build-result index.
///
/// Never created or mutated by the bot, only looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReusableBuild {
    /// Id of the job document in the index.
    pub job_id: String,
    /// Orchestration-service build id.
    pub build_id: String,
    pub build_number: u64,
    pub branch: String,
    /// Commit the build ran against.
    pub commit: Sha,
    pub state: String,
    pub pipeline_slug: String,
    pub created_at: DateTime<Utc>,
    pub web_url: Option<String>,
}

impl ReusableBuild {
    pub fn is_passed(&self) -> bool {
        self.state == "passed"
    }
}
