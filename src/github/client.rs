//! Octocrab-backed implementation of [`IssuePlatform`].
//!
//! Requests go through octocrab's raw route helpers (`get`, `post`, `patch`)
//! and are decoded into small wire structs holding only the fields we read,
//! so API additions on GitHub's side never break decoding.
//!
//! # Sync bridge
//!
//! Every operation exists as an `async` inherent method. The [`IssuePlatform`]
//! impl drives those on the runtime captured at construction with
//! `Handle::block_on`, which is only valid from a blocking thread (the engine
//! runs under `spawn_blocking`). Async callers such as startup validation use
//! the inherent methods directly.

use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use super::error::GitHubApiError;
use super::platform::{
    Issue, IssueComment, IssuePlatform, NewPullRequest, PullRequest, Result, comments_after,
};
use crate::config::Secret;
use crate::types::{CommentId, IssueNumber, PrNumber, RepoId};

const PER_PAGE: u8 = 100;

/// A GitHub API client plus the runtime used for the blocking bridge.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    handle: Handle,
}

// ─── Wire types ───

#[derive(Deserialize)]
struct WireIssue {
    number: u64,
    title: String,
    body: Option<String>,
}

#[derive(Deserialize)]
struct WireComment {
    id: u64,
    body: Option<String>,
}

#[derive(Deserialize)]
struct WirePull {
    number: u64,
    html_url: Option<String>,
    body: Option<String>,
}

#[derive(Deserialize)]
struct WireUser {
    login: String,
}

#[derive(Deserialize)]
struct WireRepository {
    permissions: Option<WirePermissions>,
}

#[derive(Deserialize)]
struct WirePermissions {
    #[serde(default)]
    push: bool,
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
    draft: bool,
}

impl From<WirePull> for PullRequest {
    fn from(pull: WirePull) -> Self {
        PullRequest {
            number: PrNumber(pull.number),
            html_url: pull.html_url,
            body: pull.body.unwrap_or_default(),
        }
    }
}

impl OctocrabClient {
    /// Wraps a pre-built octocrab instance. Must be called inside a tokio
    /// runtime.
    pub fn new(client: Octocrab) -> std::result::Result<Self, GitHubApiError> {
        let handle = Handle::try_current()
            .map_err(|e| GitHubApiError::new(None, format!("no tokio runtime: {}", e)))?;
        Ok(Self { client, handle })
    }

    /// Creates a token-authenticated client for `api_base_url`.
    pub fn from_token(token: &Secret, api_base_url: &str) -> std::result::Result<Self, GitHubApiError> {
        let client = Octocrab::builder()
            .personal_token(token.expose().to_string())
            .base_uri(api_base_url)
            .map_err(GitHubApiError::from_octocrab)?
            .build()
            .map_err(GitHubApiError::from_octocrab)?;
        Self::new(client)
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    // ─── Issues ───

    #[instrument(skip(self), fields(repo = %repo, issue = %issue))]
    pub async fn issue(&self, repo: &RepoId, issue: IssueNumber) -> Result<Issue> {
        let route = format!("/repos/{}/{}/issues/{}", repo.owner, repo.name, issue.0);
        let wire: WireIssue = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(Issue {
            number: IssueNumber(wire.number),
            title: wire.title,
            body: wire.body.unwrap_or_default(),
        })
    }

    /// Pages through all comments on `issue`, keeping those newer than `since`.
    #[instrument(skip(self), fields(repo = %repo, issue = %issue, since = %since))]
    pub async fn issue_comments_since(
        &self,
        repo: &RepoId,
        issue: IssueNumber,
        since: CommentId,
    ) -> Result<Vec<IssueComment>> {
        let route = format!(
            "/repos/{}/{}/issues/{}/comments",
            repo.owner, repo.name, issue.0
        );
        let mut page = 1u32;
        let mut all = Vec::new();

        loop {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let items: Vec<WireComment> = self
                .client
                .get(&route, Some(&params))
                .await
                .map_err(GitHubApiError::from_octocrab)?;
            let is_last_page = items.len() < PER_PAGE as usize;

            all.extend(items.into_iter().map(|c| IssueComment {
                id: CommentId(c.id),
                body: c.body.unwrap_or_default(),
            }));

            if is_last_page {
                break;
            }
            page += 1;
        }

        let total = all.len();
        let fresh = comments_after(all, since);
        debug!(total, fresh = fresh.len(), "fetched issue comments");
        Ok(fresh)
    }

    pub async fn post_issue_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()> {
        let route = format!(
            "/repos/{}/{}/issues/{}/comments",
            repo.owner, repo.name, issue.0
        );
        let _: serde_json::Value = self
            .client
            .post(route, Some(&CommentRequest { body }))
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(())
    }

    // ─── Pull requests ───

    #[instrument(skip(self, request), fields(repo = %repo, head = %request.head, base = %request.base))]
    pub async fn open_pull_request(&self, repo: &RepoId, request: &NewPullRequest) -> Result<PullRequest> {
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let body = CreatePullRequest {
            title: &request.title,
            head: &request.head,
            base: &request.base,
            body: &request.body,
            draft: false,
        };
        let wire: WirePull = self
            .client
            .post(route, Some(&body))
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(wire.into())
    }

    pub async fn pull_request(&self, repo: &RepoId, pr: PrNumber) -> Result<PullRequest> {
        let route = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.name, pr.0);
        let wire: WirePull = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(wire.into())
    }

    pub async fn set_pull_request_body(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()> {
        let route = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.name, pr.0);
        let _: serde_json::Value = self
            .client
            .patch(route, Some(&CommentRequest { body }))
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(())
    }

    /// PR timeline comments use the issue comments endpoint.
    pub async fn post_pull_request_comment(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()> {
        self.post_issue_comment(repo, IssueNumber(pr.0), body).await
    }

    // ─── Startup checks ───

    /// Returns the login of the authenticated user.
    pub async fn verify_authentication(&self) -> Result<String> {
        let user: WireUser = self
            .client
            .get("/user", None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(user.login)
    }

    /// Whether the token may push to `repo`.
    pub async fn repository_push_permission(&self, repo: &RepoId) -> Result<bool> {
        let route = format!("/repos/{}/{}", repo.owner, repo.name);
        let wire: WireRepository = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        Ok(wire.permissions.is_some_and(|p| p.push))
    }
}

impl IssuePlatform for OctocrabClient {
    fn get_issue(&self, repo: &RepoId, issue: IssueNumber) -> Result<Issue> {
        self.handle.block_on(self.issue(repo, issue))
    }

    fn list_issue_comments_since(
        &self,
        repo: &RepoId,
        issue: IssueNumber,
        since: CommentId,
    ) -> Result<Vec<IssueComment>> {
        self.handle
            .block_on(self.issue_comments_since(repo, issue, since))
    }

    fn create_issue_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()> {
        self.handle
            .block_on(self.post_issue_comment(repo, issue, body))
    }

    fn create_pull_request(&self, repo: &RepoId, request: &NewPullRequest) -> Result<PullRequest> {
        self.handle.block_on(self.open_pull_request(repo, request))
    }

    fn get_pull_request(&self, repo: &RepoId, pr: PrNumber) -> Result<PullRequest> {
        self.handle.block_on(self.pull_request(repo, pr))
    }

    fn update_pull_request_body(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()> {
        self.handle
            .block_on(self.set_pull_request_body(repo, pr, body))
    }

    fn create_pull_request_comment(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()> {
        self.handle
            .block_on(self.post_pull_request_comment(repo, pr, body))
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient").finish_non_exhaustive()
    }
}
