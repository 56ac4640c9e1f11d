//! The issue-tracker operations the engine depends on.
//!
//! The engine runs on a blocking thread, so [`IssuePlatform`] is synchronous.
//! [`OctocrabClient`](super::OctocrabClient) bridges it onto the async octocrab
//! API; tests use an in-memory fake.

use serde::{Deserialize, Serialize};

use super::error::GitHubApiError;
use crate::types::{CommentId, IssueNumber, PrNumber, RepoId};

/// Result type for platform calls.
pub type Result<T> = std::result::Result<T, GitHubApiError>;

/// The parts of an issue the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueNumber,
    pub title: String,
    pub body: String,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: CommentId,
    pub body: String,
}

/// The parts of a pull request the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: PrNumber,
    pub html_url: Option<String>,
    pub body: String,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    /// `owner:branch`.
    pub head: String,
    pub base: String,
    pub body: String,
}

pub trait IssuePlatform: Send + Sync {
    fn get_issue(&self, repo: &RepoId, issue: IssueNumber) -> Result<Issue>;

    /// Every comment with an id greater than `since`, ascending by id.
    ///
    /// GitHub cannot filter by id, so implementations page through all
    /// comments and filter locally.
    fn list_issue_comments_since(
        &self,
        repo: &RepoId,
        issue: IssueNumber,
        since: CommentId,
    ) -> Result<Vec<IssueComment>>;

    fn create_issue_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()>;

    /// Opens a ready-for-review (never draft) pull request.
    fn create_pull_request(&self, repo: &RepoId, request: &NewPullRequest) -> Result<PullRequest>;

    fn get_pull_request(&self, repo: &RepoId, pr: PrNumber) -> Result<PullRequest>;

    fn update_pull_request_body(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()>;

    /// Posts a timeline comment on a pull request.
    fn create_pull_request_comment(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()>;
}

impl<T: IssuePlatform + ?Sized> IssuePlatform for std::sync::Arc<T> {
    fn get_issue(&self, repo: &RepoId, issue: IssueNumber) -> Result<Issue> {
        (**self).get_issue(repo, issue)
    }

    fn list_issue_comments_since(
        &self,
        repo: &RepoId,
        issue: IssueNumber,
        since: CommentId,
    ) -> Result<Vec<IssueComment>> {
        (**self).list_issue_comments_since(repo, issue, since)
    }

    fn create_issue_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()> {
        (**self).create_issue_comment(repo, issue, body)
    }

    fn create_pull_request(&self, repo: &RepoId, request: &NewPullRequest) -> Result<PullRequest> {
        (**self).create_pull_request(repo, request)
    }

    fn get_pull_request(&self, repo: &RepoId, pr: PrNumber) -> Result<PullRequest> {
        (**self).get_pull_request(repo, pr)
    }

    fn update_pull_request_body(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()> {
        (**self).update_pull_request_body(repo, pr, body)
    }

    fn create_pull_request_comment(&self, repo: &RepoId, pr: PrNumber, body: &str) -> Result<()> {
        (**self).create_pull_request_comment(repo, pr, body)
    }
}

/// Keeps comments newer than `since`, in ascending id order.
pub fn comments_after(mut comments: Vec<IssueComment>, since: CommentId) -> Vec<IssueComment> {
    comments.retain(|c| c.id > since);
    comments.sort_by_key(|c| c.id);
    comments
}
