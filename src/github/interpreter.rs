//! GitHub effect interpreter using octocrab.
//!
//! Most endpoints are called through octocrab's generic `get`/`post` with
//! local response structs, so only the fields the engine reads are decoded.

use serde::{Deserialize, Serialize};

use crate::effects::{CommentData, CommitState, GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::{
    BranchRef, ChangedFile, CommentId, PrNumber, PrState, PullRequest, RepoId, Sha,
};

use super::client::GitHubClient;
use super::error::GitHubApiError;
use super::retry::{RetryConfig, retry_with_backoff};

/// GitHub serves at most 250 commits for a PR.
const MAX_PR_COMMIT_PAGES: u32 = 3;

/// GitHub serves at most 3000 files for a PR.
const MAX_PR_FILE_PAGES: u32 = 30;

const PER_PAGE: u32 = 100;

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl GitHubInterpreter for GitHubClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        interpret_github_effect(self, effect, self.retry_config()).await
    }
}

/// Executes a GitHub effect with retry.
pub async fn interpret_github_effect(
    client: &GitHubClient,
    effect: GitHubEffect,
    retry_config: RetryConfig,
) -> Result<GitHubResponse, GitHubApiError> {
    if client.is_dry_run()
        && let Some(response) = dry_run_response(&effect)
    {
        tracing::info!(?effect, "Dry run: skipping GitHub write");
        return Ok(response);
    }

    retry_with_backoff(retry_config, || execute_effect(client, effect.clone())).await
}

/// The response a write would have produced, or `None` for reads.
fn dry_run_response(effect: &GitHubEffect) -> Option<GitHubResponse> {
    match effect {
        GitHubEffect::DeleteComment { .. } => Some(GitHubResponse::CommentDeleted),
        GitHubEffect::PostComment { .. } => Some(GitHubResponse::CommentPosted { id: CommentId(0) }),
        GitHubEffect::CreateCommitStatus { .. } => Some(GitHubResponse::StatusCreated),
        _ => None,
    }
}

async fn execute_effect(
    client: &GitHubClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    match effect {
        GitHubEffect::GetFileContent {
            repo,
            git_ref,
            path,
        } => get_file_content(client, &repo, &git_ref, &path).await,
        GitHubEffect::GetPr { repo, pr } => get_pr(client, &repo, pr).await,
        GitHubEffect::ListPrCommits { repo, pr } => list_pr_commits(client, &repo, pr).await,
        GitHubEffect::ListBranchCommits {
            repo,
            branch,
            count,
        } => list_branch_commits(client, &repo, &branch, count).await,
        GitHubEffect::CompareCommits { repo, base, head } => {
            compare_commits(client, &repo, &base, &head).await
        }
        GitHubEffect::ListPrFiles { repo, pr } => list_pr_files(client, &repo, pr).await,
        GitHubEffect::ListComments { repo, pr } => list_comments(client, &repo, pr).await,
        GitHubEffect::DeleteComment { repo, comment_id } => {
            delete_comment(client, &repo, comment_id).await
        }
        GitHubEffect::PostComment { repo, pr, body } => {
            post_comment(client, &repo, pr, body).await
        }
        GitHubEffect::CreateCommitStatus {
            repo,
            sha,
            state,
            context,
            description,
            target_url,
        } => {
            create_commit_status(client, &repo, &sha, state, context, description, target_url)
                .await
        }
        GitHubEffect::GetCollaboratorPermission { repo, username } => {
            get_collaborator_permission(client, &repo, &username).await
        }
        GitHubEffect::CheckOrgMembership { org, username } => {
            check_org_membership(client, &org, &username).await
        }
    }
}

#[derive(Serialize)]
struct PageParams {
    per_page: u32,
    page: u32,
}

// ─── Repository Content ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentResponse {
    File {
        #[serde(default)]
        content: Option<String>,
    },
    Directory(Vec<serde_json::Value>),
}

async fn get_file_content(
    client: &GitHubClient,
    repo: &RepoId,
    git_ref: &str,
    path: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/contents/{}", repo.owner, repo.repo, path);

    #[derive(Serialize)]
    struct RefParam<'a> {
        r#ref: &'a str,
    }

    let result: Result<ContentResponse, _> = client
        .inner()
        .get(&url, Some(&RefParam { r#ref: git_ref }))
        .await;

    match result {
        Ok(ContentResponse::File {
            content: Some(content),
        }) => Ok(GitHubResponse::FileContent(content)),
        Ok(ContentResponse::File { content: None }) => Err(
            GitHubApiError::permanent_without_source(format!(
                "{}/{}@{} has no inline content",
                repo, path, git_ref
            )),
        ),
        Ok(ContentResponse::Directory(_)) => Err(GitHubApiError::permanent_without_source(
            format!(
                "Expected {}/{}@{} to be a file, got a directory instead",
                repo, path, git_ref
            ),
        )),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

// ─── PR Queries ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UserRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct LabelRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoRef {
    name: String,
    owner: UserRef,
    #[serde(default)]
    git_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
    /// Null when the head fork has been deleted.
    #[serde(default)]
    repo: Option<RepoRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullResponse {
    number: u64,
    state: String,
    #[serde(default)]
    user: Option<UserRef>,
    base: BranchResponse,
    head: BranchResponse,
    #[serde(default)]
    labels: Vec<LabelRef>,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    changed_files: Option<u64>,
    #[serde(default)]
    commits: Option<u64>,
    #[serde(default)]
    draft: Option<bool>,
}

fn branch_ref(branch: BranchResponse, fallback: &RepoId) -> BranchRef {
    let (repo, git_url) = match branch.repo {
        Some(r) => (RepoId::new(r.owner.login, r.name), r.git_url),
        None => (fallback.clone(), None),
    };
    BranchRef {
        ref_name: branch.ref_name,
        sha: Sha::new(branch.sha),
        repo,
        git_url,
    }
}

/// Converts the REST pull request shape into the engine's snapshot.
pub(crate) fn into_pull_request(pull: PullResponse, repo: &RepoId) -> PullRequest {
    let base = branch_ref(pull.base, repo);
    let head = branch_ref(pull.head, &base.repo);

    PullRequest {
        number: PrNumber(pull.number),
        state: if pull.state == "open" {
            PrState::Open
        } else {
            PrState::Closed
        },
        author: pull.user.map(|u| u.login).unwrap_or_default(),
        base,
        head,
        labels: pull.labels.into_iter().map(|l| l.name).collect(),
        mergeable: pull.mergeable,
        merge_commit_sha: pull.merge_commit_sha.map(Sha::new),
        changed_files: pull.changed_files.unwrap_or(0),
        commits: pull.commits.unwrap_or(0),
        draft: pull.draft.unwrap_or(false),
    }
}

async fn get_pr(
    client: &GitHubClient,
    repo: &RepoId,
    pr: PrNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.repo, pr.0);
    let result: Result<PullResponse, _> = client.inner().get(&url, None::<&()>).await;

    match result {
        Ok(pull) => Ok(GitHubResponse::Pr(Box::new(into_pull_request(pull, repo)))),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

async fn list_pr_commits(
    client: &GitHubClient,
    repo: &RepoId,
    pr: PrNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/pulls/{}/commits", repo.owner, repo.repo, pr.0);
    let mut all_commits = Vec::new();

    for page in 1..=MAX_PR_COMMIT_PAGES {
        let result: Result<Vec<CommitRef>, _> = client
            .inner()
            .get(&url, Some(&PageParams { per_page: PER_PAGE, page }))
            .await;

        let items = result.map_err(GitHubApiError::from)?;
        let is_last_page = items.len() < PER_PAGE as usize;
        all_commits.extend(items.into_iter().map(|c| Sha::new(c.sha)));

        if is_last_page {
            break;
        }
    }

    Ok(GitHubResponse::Commits(all_commits))
}

async fn list_branch_commits(
    client: &GitHubClient,
    repo: &RepoId,
    branch: &str,
    count: u8,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/commits", repo.owner, repo.repo);

    #[derive(Serialize)]
    struct Params<'a> {
        sha: &'a str,
        per_page: u8,
    }

    let result: Result<Vec<CommitRef>, _> = client
        .inner()
        .get(
            &url,
            Some(&Params {
                sha: branch,
                per_page: count,
            }),
        )
        .await;

    match result {
        Ok(items) => Ok(GitHubResponse::Commits(
            items.into_iter().map(|c| Sha::new(c.sha)).collect(),
        )),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    #[serde(default)]
    previous_filename: Option<String>,
}

impl From<FileEntry> for ChangedFile {
    fn from(entry: FileEntry) -> Self {
        ChangedFile {
            filename: entry.filename,
            previous_filename: entry.previous_filename,
        }
    }
}

async fn compare_commits(
    client: &GitHubClient,
    repo: &RepoId,
    base: &Sha,
    head: &Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/compare/{}...{}",
        repo.owner, repo.repo, base, head
    );

    #[derive(Deserialize)]
    struct CompareResponse {
        #[serde(default)]
        files: Vec<FileEntry>,
    }

    let result: Result<CompareResponse, _> = client.inner().get(&url, None::<&()>).await;

    match result {
        Ok(compare) => Ok(GitHubResponse::Files(
            compare.files.into_iter().map(ChangedFile::from).collect(),
        )),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

async fn list_pr_files(
    client: &GitHubClient,
    repo: &RepoId,
    pr: PrNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/pulls/{}/files", repo.owner, repo.repo, pr.0);
    let mut all_files = Vec::new();

    for page in 1..=MAX_PR_FILE_PAGES {
        let result: Result<Vec<FileEntry>, _> = client
            .inner()
            .get(&url, Some(&PageParams { per_page: PER_PAGE, page }))
            .await;

        let items = result.map_err(GitHubApiError::from)?;
        let is_last_page = items.len() < PER_PAGE as usize;
        all_files.extend(items.into_iter().map(ChangedFile::from));

        if is_last_page {
            break;
        }
    }

    Ok(GitHubResponse::Files(all_files))
}

// ─── Comments ─────────────────────────────────────────────────────────────────

async fn list_comments(
    client: &GitHubClient,
    repo: &RepoId,
    pr: PrNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let mut page = 1u32;
    let mut all_comments = Vec::new();

    loop {
        let result = client
            .inner()
            .issues(&repo.owner, &repo.repo)
            .list_comments(pr.0)
            .per_page(PER_PAGE as u8)
            .page(page)
            .send()
            .await;

        match result {
            Ok(page_result) => {
                let items = page_result.items;
                let is_last_page = items.len() < PER_PAGE as usize;

                all_comments.extend(items.into_iter().map(|comment| CommentData {
                    id: CommentId(comment.id.into_inner()),
                    author: comment.user.login,
                    body: comment.body.unwrap_or_default(),
                }));

                if is_last_page {
                    break;
                }
                page += 1;
            }
            Err(e) => return Err(GitHubApiError::from(e)),
        }
    }

    Ok(GitHubResponse::Comments(all_comments))
}

async fn delete_comment(
    client: &GitHubClient,
    repo: &RepoId,
    comment_id: CommentId,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .issues(&repo.owner, &repo.repo)
        .delete_comment(octocrab::models::CommentId(comment_id.0))
        .await;

    match result {
        Ok(()) => Ok(GitHubResponse::CommentDeleted),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

async fn post_comment(
    client: &GitHubClient,
    repo: &RepoId,
    pr: PrNumber,
    body: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .issues(&repo.owner, &repo.repo)
        .create_comment(pr.0, body)
        .await;

    match result {
        Ok(comment) => Ok(GitHubResponse::CommentPosted {
            id: CommentId(comment.id.into_inner()),
        }),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

// ─── Statuses ─────────────────────────────────────────────────────────────────

async fn create_commit_status(
    client: &GitHubClient,
    repo: &RepoId,
    sha: &Sha,
    state: CommitState,
    context: String,
    description: String,
    target_url: Option<String>,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/statuses/{}", repo.owner, repo.repo, sha);

    #[derive(Serialize)]
    struct StatusRequest {
        state: &'static str,
        context: String,
        description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_url: Option<String>,
    }

    let request = StatusRequest {
        state: state.as_api_str(),
        context,
        description,
        target_url,
    };

    let result: Result<serde_json::Value, _> = client.inner().post(&url, Some(&request)).await;

    match result {
        Ok(_) => Ok(GitHubResponse::StatusCreated),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

// ─── Authorization ────────────────────────────────────────────────────────────

async fn get_collaborator_permission(
    client: &GitHubClient,
    repo: &RepoId,
    username: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/collaborators/{}/permission",
        repo.owner,
        repo.repo,
        urlencoding::encode(username)
    );

    #[derive(Deserialize)]
    struct PermissionResponse {
        permission: String,
    }

    let result: Result<PermissionResponse, _> = client.inner().get(&url, None::<&()>).await;

    match result {
        Ok(resp) => Ok(GitHubResponse::Permission(resp.permission)),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}

/// Membership is confirmed only by a 204; octocrab maps anything else to `false`.
async fn check_org_membership(
    client: &GitHubClient,
    org: &str,
    username: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client.inner().orgs(org).check_membership(username).await;

    match result {
        Ok(is_member) => Ok(GitHubResponse::IsMember(is_member)),
        Err(e) => Err(GitHubApiError::from(e)),
    }
}
