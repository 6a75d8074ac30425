//! Build-orchestration effect types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::CiBuild;

/// The body of a create-build request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildRequest {
    /// `head_owner:head_branch`, or a fixed branch override.
    pub branch: String,
    pub commit: String,
    pub pull_request_base_branch: String,
    pub pull_request_id: u64,
    /// Git URL of the head repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_repository: Option<String>,
    pub env: BTreeMap<String, String>,
}

/// A build-orchestration effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CiEffect {
    /// Create a build on a pipeline.
    TriggerBuild {
        pipeline: String,
        request: BuildRequest,
    },

    /// List scheduled, running and failing builds of a pipeline on a branch.
    ListRunningBuilds { pipeline: String, branch: String },

    /// Cancel a build by number.
    CancelBuild { pipeline: String, number: u64 },
}

/// Response from a build-orchestration effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CiResponse {
    /// Response to `TriggerBuild`.
    Build(CiBuild),

    /// Response to `ListRunningBuilds`.
    Builds(Vec<CiBuild>),

    /// Response to `CancelBuild`.
    Cancelled,
}
