//! Shared test utilities: recording interpreters, fixtures and arbitrary
//! generators for property-based testing.

use std::future::{Future, ready};
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use crate::effects::{
    CiEffect, CiInterpreter, CiResponse, GitHubEffect, GitHubInterpreter, GitHubResponse,
    IndexEffect, IndexInterpreter, IndexResponse,
};
use crate::types::{
    BranchRef, ChangedFile, CiBuild, PrNumber, PrState, PullRequest, RepoId, ReusableBuild, Sha,
};

// ─── Recording interpreters ───────────────────────────────────────────────────

type Handler<E, R> = Box<dyn Fn(E) -> Result<R, String> + Send + Sync>;

/// A GitHub interpreter that answers from a closure and records every effect.
pub struct MockGitHub {
    handler: Handler<GitHubEffect, GitHubResponse>,
    calls: Mutex<Vec<GitHubEffect>>,
}

impl MockGitHub {
    pub fn new(
        handler: impl Fn(GitHubEffect) -> Result<GitHubResponse, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GitHubEffect> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded effects that mutate GitHub state.
    pub fn mutations(&self) -> Vec<GitHubEffect> {
        self.calls().into_iter().filter(|e| e.is_mutation()).collect()
    }
}

impl GitHubInterpreter for MockGitHub {
    type Error = String;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send {
        self.calls.lock().unwrap().push(effect.clone());
        ready((self.handler)(effect))
    }
}

/// A build-orchestration interpreter that answers from a closure.
pub struct MockCi {
    handler: Handler<CiEffect, CiResponse>,
    calls: Mutex<Vec<CiEffect>>,
}

impl MockCi {
    pub fn new(
        handler: impl Fn(CiEffect) -> Result<CiResponse, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Triggers return build 100 and the pipeline has nothing running.
    pub fn accepting() -> Self {
        Self::new(|effect| match effect {
            CiEffect::TriggerBuild { .. } => Ok(CiResponse::Build(ci_build(100))),
            CiEffect::ListRunningBuilds { .. } => Ok(CiResponse::Builds(Vec::new())),
            CiEffect::CancelBuild { .. } => Ok(CiResponse::Cancelled),
        })
    }

    pub fn calls(&self) -> Vec<CiEffect> {
        self.calls.lock().unwrap().clone()
    }

    /// The bodies of every recorded trigger, in order.
    pub fn triggered(&self) -> Vec<crate::effects::BuildRequest> {
        self.calls()
            .into_iter()
            .filter_map(|e| match e {
                CiEffect::TriggerBuild { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }
}

impl CiInterpreter for MockCi {
    type Error = String;

    fn interpret(
        &self,
        effect: CiEffect,
    ) -> impl Future<Output = Result<CiResponse, Self::Error>> + Send {
        self.calls.lock().unwrap().push(effect.clone());
        ready((self.handler)(effect))
    }
}

/// A build-index interpreter that answers from a closure.
pub struct MockIndex {
    handler: Handler<IndexEffect, IndexResponse>,
    calls: Mutex<Vec<IndexEffect>>,
}

impl MockIndex {
    pub fn new(
        handler: impl Fn(IndexEffect) -> Result<IndexResponse, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// An index with no builds in it.
    pub fn empty() -> Self {
        Self::new(|_| Ok(IndexResponse::Jobs(Vec::new())))
    }

    pub fn calls(&self) -> Vec<IndexEffect> {
        self.calls.lock().unwrap().clone()
    }
}

impl IndexInterpreter for MockIndex {
    type Error = String;

    fn interpret(
        &self,
        effect: IndexEffect,
    ) -> impl Future<Output = Result<IndexResponse, Self::Error>> + Send {
        self.calls.lock().unwrap().push(effect.clone());
        ready((self.handler)(effect))
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

/// A contents-API response carrying `json`.
pub fn file_response(json: &str) -> GitHubResponse {
    GitHubResponse::FileContent(STANDARD.encode(json))
}

pub fn sha(fill: char) -> Sha {
    Sha::new(fill.to_string().repeat(40))
}

/// An open, mergeable PR from a fork of `elastic/kibana` into `main`.
pub fn pull_request(number: u64) -> PullRequest {
    PullRequest {
        number: PrNumber(number),
        state: PrState::Open,
        author: "contributor".to_string(),
        base: BranchRef {
            ref_name: "main".to_string(),
            sha: sha('b'),
            repo: RepoId::new("elastic", "kibana"),
            git_url: Some("git://github.com/elastic/kibana.git".to_string()),
        },
        head: BranchRef {
            ref_name: "feature".to_string(),
            sha: sha('a'),
            repo: RepoId::new("contributor", "kibana"),
            git_url: Some("git://github.com/contributor/kibana.git".to_string()),
        },
        labels: Vec::new(),
        mergeable: Some(true),
        merge_commit_sha: Some(sha('m')),
        changed_files: 1,
        commits: 1,
        draft: false,
    }
}

pub fn ci_build(number: u64) -> CiBuild {
    CiBuild {
        id: format!("build-{number}"),
        number,
        url: format!("https://api.buildkite.com/v2/organizations/elastic/pipelines/p/builds/{number}"),
        web_url: format!("https://buildkite.com/elastic/p/builds/{number}"),
        state: "scheduled".to_string(),
        commit: sha('a').to_string(),
    }
}

pub fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .unwrap()
}

pub fn reusable_build(number: u64, commit: Sha, state: &str, age_secs: i64) -> ReusableBuild {
    ReusableBuild {
        job_id: format!("job-{number}"),
        build_id: format!("build-{number}"),
        build_number: number,
        branch: "contributor:feature".to_string(),
        commit,
        state: state.to_string(),
        pipeline_slug: "kibana-pull-request".to_string(),
        created_at: timestamp(-age_secs),
        web_url: Some(format!("https://buildkite.com/elastic/kibana-pull-request/builds/{number}")),
    }
}

// ─── Generators ───────────────────────────────────────────────────────────────

pub fn arb_pr_number() -> impl Strategy<Value = PrNumber> {
    (1..100_000u64).prop_map(PrNumber)
}

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(Sha::new)
}

pub fn arb_path() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z]{1,8}){0,3}\\.(md|rs|ts|json)".prop_map(String::from)
}

pub fn arb_changed_file() -> impl Strategy<Value = ChangedFile> {
    (arb_path(), prop::option::of(arb_path())).prop_map(|(filename, previous_filename)| {
        ChangedFile {
            filename,
            previous_filename,
        }
    })
}

pub fn arb_changed_files(max: usize) -> impl Strategy<Value = Vec<ChangedFile>> {
    prop::collection::vec(arb_changed_file(), 0..max)
}
