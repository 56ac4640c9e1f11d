//! Local git operations for the work clone.
//!
//! This module implements the git steps of a run:
//! - Cloning the base branch once per work root
//! - Resetting the base branch to the remote and checking out the work branch
//! - Committing everything the agent changed
//! - Pushing the work branch
//!
//! Every command runs through a [`CommandRunner`](crate::process::CommandRunner)
//! with a clean git environment (no system or global config, no prompts).
//! Authentication uses a transient header (see [`auth`]), and commit identity is
//! passed with `-c` flags so nothing is persisted in `.git/config`.

pub mod auth;
mod ops;

#[cfg(test)]
mod tests;

use std::path::Path;

use thiserror::Error;

use crate::process::{CommandError, tail_chars};
use crate::types::{RepoId, Sha};

pub use auth::GitAuth;
pub use ops::GitOps;

/// Maximum number of stderr characters kept in a [`GitError`].
pub const MAX_STDERR_CHARS: usize = 2000;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A git command exited non-zero. `command` is already redacted.
    #[error("{}", describe_failure(.message, .command, .exit_code, .stderr))]
    CommandFailed {
        message: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The work branch and the base branch are the same.
    #[error("branch must not be the same as base_branch: {branch}")]
    SameBranch { branch: String },

    /// `rev-parse HEAD` printed nothing.
    #[error("Failed to read HEAD sha.")]
    EmptyHead,

    /// git could not be launched at all.
    #[error("git could not be run: {0}")]
    Command(#[from] CommandError),
}

impl GitError {
    /// Builds a `CommandFailed`, keeping only the trimmed stderr tail.
    pub fn command_failed(
        message: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: &str,
    ) -> Self {
        GitError::CommandFailed {
            message: message.into(),
            command: command.into(),
            exit_code,
            stderr: tail_chars(stderr.trim(), MAX_STDERR_CHARS).to_string(),
        }
    }

    /// The captured stderr, if this error came from a failed command.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn describe_failure(message: &str, command: &str, exit_code: &Option<i32>, stderr: &str) -> String {
    let mut parts = vec![message.to_string()];
    if !command.is_empty() {
        parts.push(format!("command={}", command));
    }
    if let Some(code) = exit_code {
        parts.push(format!("exit_code={}", code));
    }
    if !stderr.is_empty() {
        parts.push(format!("stderr={}", stderr));
    }
    parts.join(" | ")
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Identity used for commits created by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// The git steps the engine drives. Implemented by [`GitOps`] and by in-memory
/// fakes in tests.
pub trait GitOperations: Send + Sync {
    /// Clones `base_branch` of `repo` into `dest` unless `dest/.git` exists.
    fn clone_if_needed(&self, repo: &RepoId, dest: &Path, base_branch: &str) -> GitResult<()>;

    /// Fetches and hard-resets `base_branch` to the remote, then checks out
    /// `branch`, creating it from the fresh base if it does not exist.
    fn ensure_branch_checked_out(
        &self,
        repo_dir: &Path,
        base_branch: &str,
        branch: &str,
    ) -> GitResult<()>;

    /// Commits every change. Returns `None` without committing when the tree
    /// is clean.
    fn commit_all_if_dirty(&self, repo_dir: &Path, message: &str) -> GitResult<Option<Sha>>;

    /// Pushes `branch` to origin with upstream tracking.
    fn push_branch(&self, repo_dir: &Path, branch: &str) -> GitResult<()>;

    fn get_head_sha(&self, repo_dir: &Path) -> GitResult<Sha>;

    fn get_status_porcelain(&self, repo_dir: &Path) -> GitResult<String>;
}

impl<T: GitOperations + ?Sized> GitOperations for std::sync::Arc<T> {
    fn clone_if_needed(&self, repo: &RepoId, dest: &Path, base_branch: &str) -> GitResult<()> {
        (**self).clone_if_needed(repo, dest, base_branch)
    }

    fn ensure_branch_checked_out(
        &self,
        repo_dir: &Path,
        base_branch: &str,
        branch: &str,
    ) -> GitResult<()> {
        (**self).ensure_branch_checked_out(repo_dir, base_branch, branch)
    }

    fn commit_all_if_dirty(&self, repo_dir: &Path, message: &str) -> GitResult<Option<Sha>> {
        (**self).commit_all_if_dirty(repo_dir, message)
    }

    fn push_branch(&self, repo_dir: &Path, branch: &str) -> GitResult<()> {
        (**self).push_branch(repo_dir, branch)
    }

    fn get_head_sha(&self, repo_dir: &Path) -> GitResult<Sha> {
        (**self).get_head_sha(repo_dir)
    }

    fn get_status_porcelain(&self, repo_dir: &Path) -> GitResult<String> {
        (**self).get_status_porcelain(repo_dir)
    }
}
