//! Typed wrappers over the interpreters.
//!
//! Each wrapper builds one effect, runs it, and unpacks the one response
//! variant that belongs to it. Interpreter errors are flattened into
//! `EngineError` through `Display`.

use std::fmt::Display;

use crate::effects::{
    BuildRequest, CiEffect, CiInterpreter, CiResponse, CommentData, CommitState, GitHubEffect,
    GitHubInterpreter, GitHubResponse, IndexEffect, IndexInterpreter, IndexResponse,
};
use crate::types::{ChangedFile, CiBuild, CommentId, PrNumber, PullRequest, RepoId, ReusableBuild, Sha};

use super::error::EngineError;

fn unexpected(effect: &'static str, response: impl std::fmt::Debug) -> EngineError {
    EngineError::UnexpectedResponse {
        effect,
        response: format!("{response:?}"),
    }
}

async fn github<G>(github: &G, effect: GitHubEffect) -> Result<GitHubResponse, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    github
        .interpret(effect)
        .await
        .map_err(|e| EngineError::GitHub(e.to_string()))
}

// ─── Source control ───────────────────────────────────────────────────────────

pub async fn get_file<G>(
    gh: &G,
    repo: &RepoId,
    git_ref: &str,
    path: &str,
) -> Result<String, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::GetFileContent {
        repo: repo.clone(),
        git_ref: git_ref.to_string(),
        path: path.to_string(),
    };
    match github(gh, effect).await? {
        GitHubResponse::FileContent(content) => Ok(content),
        other => Err(unexpected("GetFileContent", other)),
    }
}

pub async fn get_pr<G>(gh: &G, repo: &RepoId, pr: PrNumber) -> Result<PullRequest, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::GetPr {
        repo: repo.clone(),
        pr,
    };
    match github(gh, effect).await? {
        GitHubResponse::Pr(pull) => Ok(*pull),
        other => Err(unexpected("GetPr", other)),
    }
}

/// The PR's commits, oldest first.
pub async fn list_pr_commits<G>(gh: &G, repo: &RepoId, pr: PrNumber) -> Result<Vec<Sha>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::ListPrCommits {
        repo: repo.clone(),
        pr,
    };
    match github(gh, effect).await? {
        GitHubResponse::Commits(commits) => Ok(commits),
        other => Err(unexpected("ListPrCommits", other)),
    }
}

/// The newest `count` commits on `branch`, newest first.
pub async fn list_branch_commits<G>(
    gh: &G,
    repo: &RepoId,
    branch: &str,
    count: u8,
) -> Result<Vec<Sha>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::ListBranchCommits {
        repo: repo.clone(),
        branch: branch.to_string(),
        count,
    };
    match github(gh, effect).await? {
        GitHubResponse::Commits(commits) => Ok(commits),
        other => Err(unexpected("ListBranchCommits", other)),
    }
}

pub async fn compare_commits<G>(
    gh: &G,
    repo: &RepoId,
    base: &Sha,
    head: &Sha,
) -> Result<Vec<ChangedFile>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::CompareCommits {
        repo: repo.clone(),
        base: base.clone(),
        head: head.clone(),
    };
    match github(gh, effect).await? {
        GitHubResponse::Files(files) => Ok(files),
        other => Err(unexpected("CompareCommits", other)),
    }
}

pub async fn list_pr_files<G>(
    gh: &G,
    repo: &RepoId,
    pr: PrNumber,
) -> Result<Vec<ChangedFile>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::ListPrFiles {
        repo: repo.clone(),
        pr,
    };
    match github(gh, effect).await? {
        GitHubResponse::Files(files) => Ok(files),
        other => Err(unexpected("ListPrFiles", other)),
    }
}

pub async fn list_comments<G>(
    gh: &G,
    repo: &RepoId,
    pr: PrNumber,
) -> Result<Vec<CommentData>, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::ListComments {
        repo: repo.clone(),
        pr,
    };
    match github(gh, effect).await? {
        GitHubResponse::Comments(comments) => Ok(comments),
        other => Err(unexpected("ListComments", other)),
    }
}

pub async fn delete_comment<G>(gh: &G, repo: &RepoId, comment_id: CommentId) -> Result<(), EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::DeleteComment {
        repo: repo.clone(),
        comment_id,
    };
    match github(gh, effect).await? {
        GitHubResponse::CommentDeleted => Ok(()),
        other => Err(unexpected("DeleteComment", other)),
    }
}

pub async fn post_comment<G>(
    gh: &G,
    repo: &RepoId,
    pr: PrNumber,
    body: String,
) -> Result<CommentId, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::PostComment {
        repo: repo.clone(),
        pr,
        body,
    };
    match github(gh, effect).await? {
        GitHubResponse::CommentPosted { id } => Ok(id),
        other => Err(unexpected("PostComment", other)),
    }
}

/// A commit status to post.
#[derive(Debug, Clone)]
pub struct StatusUpdate<'a> {
    pub sha: &'a Sha,
    pub state: CommitState,
    pub context: &'a str,
    pub description: &'a str,
    pub target_url: Option<&'a str>,
}

pub async fn create_status<G>(
    gh: &G,
    repo: &RepoId,
    status: StatusUpdate<'_>,
) -> Result<(), EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::CreateCommitStatus {
        repo: repo.clone(),
        sha: status.sha.clone(),
        state: status.state,
        context: status.context.to_string(),
        description: status.description.to_string(),
        target_url: status.target_url.map(str::to_string),
    };
    match github(gh, effect).await? {
        GitHubResponse::StatusCreated => Ok(()),
        other => Err(unexpected("CreateCommitStatus", other)),
    }
}

pub async fn collaborator_permission<G>(
    gh: &G,
    repo: &RepoId,
    username: &str,
) -> Result<String, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::GetCollaboratorPermission {
        repo: repo.clone(),
        username: username.to_string(),
    };
    match github(gh, effect).await? {
        GitHubResponse::Permission(permission) => Ok(permission),
        other => Err(unexpected("GetCollaboratorPermission", other)),
    }
}

pub async fn is_org_member<G>(gh: &G, org: &str, username: &str) -> Result<bool, EngineError>
where
    G: GitHubInterpreter,
    G::Error: Display,
{
    let effect = GitHubEffect::CheckOrgMembership {
        org: org.to_string(),
        username: username.to_string(),
    };
    match github(gh, effect).await? {
        GitHubResponse::IsMember(member) => Ok(member),
        other => Err(unexpected("CheckOrgMembership", other)),
    }
}

// ─── Orchestration ────────────────────────────────────────────────────────────

async fn ci<C>(ci: &C, effect: CiEffect) -> Result<CiResponse, EngineError>
where
    C: CiInterpreter,
    C::Error: Display,
{
    ci.interpret(effect)
        .await
        .map_err(|e| EngineError::Ci(e.to_string()))
}

pub async fn trigger_build<C>(
    client: &C,
    pipeline: &str,
    request: BuildRequest,
) -> Result<CiBuild, EngineError>
where
    C: CiInterpreter,
    C::Error: Display,
{
    let effect = CiEffect::TriggerBuild {
        pipeline: pipeline.to_string(),
        request,
    };
    match ci(client, effect).await? {
        CiResponse::Build(build) => Ok(build),
        other => Err(unexpected("TriggerBuild", other)),
    }
}

pub async fn running_builds<C>(
    client: &C,
    pipeline: &str,
    branch: &str,
) -> Result<Vec<CiBuild>, EngineError>
where
    C: CiInterpreter,
    C::Error: Display,
{
    let effect = CiEffect::ListRunningBuilds {
        pipeline: pipeline.to_string(),
        branch: branch.to_string(),
    };
    match ci(client, effect).await? {
        CiResponse::Builds(builds) => Ok(builds),
        other => Err(unexpected("ListRunningBuilds", other)),
    }
}

pub async fn cancel_build<C>(client: &C, pipeline: &str, number: u64) -> Result<(), EngineError>
where
    C: CiInterpreter,
    C::Error: Display,
{
    let effect = CiEffect::CancelBuild {
        pipeline: pipeline.to_string(),
        number,
    };
    match ci(client, effect).await? {
        CiResponse::Cancelled => Ok(()),
        other => Err(unexpected("CancelBuild", other)),
    }
}

// ─── Build index ──────────────────────────────────────────────────────────────

pub async fn search_build_jobs<I>(
    index: &I,
    commits: &[Sha],
    pipeline_slugs: &[String],
) -> Result<Vec<ReusableBuild>, EngineError>
where
    I: IndexInterpreter,
    I::Error: Display,
{
    let effect = IndexEffect::SearchBuildJobs {
        commits: commits.to_vec(),
        pipeline_slugs: pipeline_slugs.to_vec(),
    };
    match index.interpret(effect).await {
        Ok(IndexResponse::Jobs(jobs)) => Ok(jobs),
        Err(e) => Err(EngineError::Index(e.to_string())),
    }
}
