//! [`GitOperations`] backed by the git CLI.

use std::path::Path;

use tracing::{debug, info, instrument};

use super::auth::GitAuth;
use super::{CommitIdentity, GitError, GitOperations, GitResult};
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::types::{RepoId, Sha};

/// Default host prefix for clone URLs.
const GITHUB_HTTPS: &str = "https://github.com";

/// Runs git through a [`CommandRunner`].
pub struct GitOps<R> {
    runner: R,
    identity: CommitIdentity,
    auth: Option<GitAuth>,
    remote_base: String,
}

impl<R: CommandRunner> GitOps<R> {
    pub fn new(runner: R, identity: CommitIdentity, auth: Option<GitAuth>) -> Self {
        GitOps {
            runner,
            identity,
            auth,
            remote_base: GITHUB_HTTPS.to_string(),
        }
    }

    /// Overrides the `https://github.com` prefix used to build clone URLs.
    pub fn with_remote_base(mut self, remote_base: impl Into<String>) -> Self {
        self.remote_base = remote_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Clone URL for `repo`. Never contains credentials.
    pub fn remote_url(&self, repo: &RepoId) -> String {
        format!("{}/{}/{}.git", self.remote_base, repo.owner, repo.name)
    }

    /// Lists the remote HEAD with the configured credentials. Used at startup
    /// to prove that git over HTTPS works before any event is accepted.
    #[instrument(skip(self), fields(repo = %repo))]
    pub fn verify_remote_access(&self, repo: &RepoId) -> GitResult<()> {
        let url = self.remote_url(repo);
        let args = ["ls-remote", url.as_str(), "HEAD"];
        let output = self.run(None, &args, true)?;
        if !output.success() {
            return Err(self.failure("git ls-remote failed", &args, true, &output));
        }
        Ok(())
    }

    /// Builds the spec for `git [-c auth] <args>` with a clean environment.
    fn spec(&self, workdir: Option<&Path>, args: &[&str], with_auth: bool) -> CommandSpec {
        let mut spec = CommandSpec::new("git")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = workdir {
            spec = spec.cwd(dir);
        }
        if with_auth && let Some(auth) = &self.auth {
            spec = spec.arg("-c").arg(auth.config_arg());
        }
        spec.args(args.iter().copied())
    }

    /// Human-readable command line with the auth header replaced.
    fn display(&self, args: &[&str], with_auth: bool) -> String {
        let mut parts = vec!["git".to_string()];
        if with_auth && self.auth.is_some() {
            parts.push("-c".to_string());
            parts.push(GitAuth::redacted_config_arg());
        }
        parts.extend(args.iter().map(|a| a.to_string()));
        parts.join(" ")
    }

    fn run(&self, workdir: Option<&Path>, args: &[&str], with_auth: bool) -> GitResult<CommandOutput> {
        debug!(command = %self.display(args, with_auth), "running git");
        Ok(self.runner.run(&self.spec(workdir, args, with_auth))?)
    }

    /// Runs a command that must succeed.
    fn run_checked(&self, workdir: &Path, args: &[&str], with_auth: bool) -> GitResult<CommandOutput> {
        let output = self.run(Some(workdir), args, with_auth)?;
        if !output.success() {
            return Err(self.failure("git command failed", args, with_auth, &output));
        }
        Ok(output)
    }

    fn failure(&self, message: &str, args: &[&str], with_auth: bool, output: &CommandOutput) -> GitError {
        let stderr = match &self.auth {
            Some(auth) => auth.redact(&output.stderr),
            None => output.stderr.clone(),
        };
        GitError::command_failed(message, self.display(args, with_auth), output.exit_code, &stderr)
    }
}

/// Picks a friendlier message when stderr looks like an auth problem.
fn auth_aware_message(operation: &str, access: &str, stderr: &str) -> String {
    if stderr.contains("403") || stderr.contains("Permission") || stderr.contains("denied") {
        format!(
            "git {operation} failed: Authentication or permission error. \
             Please verify that the GitHub token has 'repo' scope and {access} access to the repository."
        )
    } else {
        format!("git {operation} failed")
    }
}

impl<R: CommandRunner> GitOperations for GitOps<R> {
    #[instrument(skip(self), fields(repo = %repo, dest = %dest.display()))]
    fn clone_if_needed(&self, repo: &RepoId, dest: &Path, base_branch: &str) -> GitResult<()> {
        if dest.join(".git").exists() {
            debug!("clone already present");
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(crate::process::CommandError::from)?;
        }

        let url = self.remote_url(repo);
        let dest_str = dest.to_string_lossy();
        let args = [
            "clone",
            "--branch",
            base_branch,
            "--single-branch",
            url.as_str(),
            dest_str.as_ref(),
        ];
        info!(base_branch, "cloning repository");
        let output = self.run(None, &args, true)?;
        if !output.success() {
            let message = auth_aware_message("clone", "read", &output.stderr);
            return Err(self.failure(&message, &args, true, &output));
        }
        Ok(())
    }

    #[instrument(skip(self, repo_dir))]
    fn ensure_branch_checked_out(
        &self,
        repo_dir: &Path,
        base_branch: &str,
        branch: &str,
    ) -> GitResult<()> {
        if branch == base_branch {
            return Err(GitError::SameBranch {
                branch: branch.to_string(),
            });
        }

        let remote_base = format!("origin/{}", base_branch);
        self.run_checked(repo_dir, &["fetch", "origin", base_branch], true)?;
        self.run_checked(repo_dir, &["checkout", base_branch], false)?;
        self.run_checked(repo_dir, &["reset", "--hard", remote_base.as_str()], false)?;

        let exists = self
            .run(Some(repo_dir), &["rev-parse", "--verify", "--quiet", branch], false)?
            .success();
        if exists {
            debug!("checking out existing work branch");
            self.run_checked(repo_dir, &["checkout", branch], false)?;
        } else {
            info!("creating work branch from base");
            self.run_checked(repo_dir, &["checkout", "-b", branch], false)?;
        }
        Ok(())
    }

    #[instrument(skip(self, repo_dir, message))]
    fn commit_all_if_dirty(&self, repo_dir: &Path, message: &str) -> GitResult<Option<Sha>> {
        if self.get_status_porcelain(repo_dir)?.trim().is_empty() {
            debug!("working tree clean, nothing to commit");
            return Ok(None);
        }

        self.run_checked(repo_dir, &["add", "-A"], false)?;

        let name = format!("user.name={}", self.identity.name);
        let email = format!("user.email={}", self.identity.email);
        let args = ["-c", name.as_str(), "-c", email.as_str(), "commit", "-m", message];
        let output = self.run(Some(repo_dir), &args, false)?;
        if !output.success() {
            return Err(self.failure("git commit failed", &args, false, &output));
        }

        let sha = self.get_head_sha(repo_dir)?;
        info!(sha = %sha.short(), "committed changes");
        Ok(Some(sha))
    }

    #[instrument(skip(self, repo_dir))]
    fn push_branch(&self, repo_dir: &Path, branch: &str) -> GitResult<()> {
        let args = ["push", "-u", "origin", branch];
        let output = self.run(Some(repo_dir), &args, true)?;
        if !output.success() {
            let message = auth_aware_message("push", "write", &output.stderr);
            return Err(self.failure(&message, &args, true, &output));
        }
        info!("pushed work branch");
        Ok(())
    }

    fn get_head_sha(&self, repo_dir: &Path) -> GitResult<Sha> {
        let output = self.run_checked(repo_dir, &["rev-parse", "HEAD"], false)?;
        let sha = output.stdout.trim();
        if sha.is_empty() {
            return Err(GitError::EmptyHead);
        }
        Ok(Sha::new(sha))
    }

    fn get_status_porcelain(&self, repo_dir: &Path) -> GitResult<String> {
        Ok(self
            .run_checked(repo_dir, &["status", "--porcelain"], false)?
            .stdout)
    }
}
