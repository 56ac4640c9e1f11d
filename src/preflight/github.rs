//! Token and repository access checks against the GitHub API and git.

use std::future::Future;

use crate::config::Secret;
use crate::git::{GitError, GitOps};
use crate::github::{GitHubApiError, OctocrabClient};
use crate::process::CommandRunner;
use crate::types::RepoId;

const MIN_TOKEN_CHARS: usize = 10;

/// The two API calls startup validation needs.
pub trait GitHubProbe: Sync {
    fn verify_authentication(&self) -> impl Future<Output = Result<String, GitHubApiError>> + Send;

    fn repository_push_permission(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<bool, GitHubApiError>> + Send;
}

impl GitHubProbe for OctocrabClient {
    fn verify_authentication(&self) -> impl Future<Output = Result<String, GitHubApiError>> + Send {
        OctocrabClient::verify_authentication(self)
    }

    fn repository_push_permission(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<bool, GitHubApiError>> + Send {
        OctocrabClient::repository_push_permission(self, repo)
    }
}

pub async fn check_token<G: GitHubProbe>(github: &G) -> Result<String, String> {
    github.verify_authentication().await.map_err(|e| match e.status_code {
        Some(401) => "GitHub token is invalid or expired. Please verify that GITHUB_TOKEN \
                      (or ENGINEER_PAT_KEY) is correct."
            .to_string(),
        Some(403) => {
            "GitHub token lacks required permissions. Please ensure the token has 'repo' scope."
                .to_string()
        }
        Some(status) => format!("GitHub API error: status={}, message={}", status, e.message),
        None => e.to_string(),
    })
}

pub fn check_token_format(token: &Secret) -> Result<(), String> {
    if token.expose().trim().chars().count() < MIN_TOKEN_CHARS {
        return Err("GitHub token appears to be invalid (too short). Please verify that \
                    GITHUB_TOKEN (or ENGINEER_PAT_KEY) is set correctly."
            .to_string());
    }
    Ok(())
}

pub async fn check_push_permission<G: GitHubProbe>(github: &G, repo: &RepoId) -> Result<(), String> {
    match github.repository_push_permission(repo).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(format!(
            "GitHub token does not have push permission to the repository. repo={}",
            repo
        )),
        Err(e) if e.is_auth_invalid() => Err(format!(
            "GitHub token is invalid or expired for repository access. repo={}",
            repo
        )),
        Err(e) if e.is_permission_or_not_found() => Err(format!(
            "GitHub token cannot access the repository or lacks permissions. repo={}",
            repo
        )),
        Err(e) => Err(format!(
            "GitHub API error while checking repository permission: status={}",
            e.status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )),
    }
}

/// `git ls-remote` with the transient auth header.
pub fn check_git_https<R: CommandRunner>(git: &GitOps<R>, repo: &RepoId) -> Result<(), String> {
    let Err(err) = git.verify_remote_access(repo) else {
        return Ok(());
    };
    let stderr = match &err {
        GitError::CommandFailed { stderr, .. } => stderr.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    if stderr.contains("invalid credentials") || stderr.contains("authentication failed") {
        Err(format!(
            "GitHub token authentication failed for Git HTTPS operations. repo={}",
            repo
        ))
    } else if stderr.contains("permission") || stderr.contains("denied") || stderr.contains("403")
    {
        Err(format!(
            "GitHub token lacks permission for Git HTTPS operations. repo={}",
            repo
        ))
    } else {
        Err(format!("Git HTTPS validation failed. repo={}", repo))
    }
}
