//! Startup validation.
//!
//! Before the listener is bound, the worker checks that everything a run will
//! need is in place, so that misconfiguration fails loudly at boot instead of
//! as a failed run comment on the first issue:
//!
//! 1. **Token**: present and accepted by the API, then long enough to be real.
//! 2. **Repository access** (only when a default repo is configured and the
//!    token checks passed): push permission through the API, then
//!    `git ls-remote` with the same credentials git will use.
//! 3. **Agent command**: `OPENHANDS_COMMAND` is set and answers `--version`.
//! 4. **LLM settings**: model name and provider key are consistent.
//!
//! Every failure is collected; the caller gets them all in one
//! [`PreflightError`].

pub mod github;
pub mod llm;
pub mod openhands;


use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::config::Config;
use crate::git::GitOps;
use crate::process::CommandRunner;

pub use github::{
    GitHubProbe, check_git_https, check_push_permission, check_token, check_token_format,
};
pub use llm::check_llm_settings;
pub use openhands::check_openhands_command;

pub const MISSING_TOKEN_MESSAGE: &str = "GITHUB_TOKEN (or ENGINEER_PAT_KEY) is required but not set.";
pub const MISSING_OPENHANDS_MESSAGE: &str = "OPENHANDS_COMMAND is required but not set.";

/// All startup checks that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct PreflightError {
    pub errors: Vec<String>,
}

impl fmt::Display for PreflightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Startup validation failed:\n\n")?;
        let lines: Vec<String> = self.errors.iter().map(|e| format!("  - {}", e)).collect();
        f.write_str(&lines.join("\n"))
    }
}

/// What the checks talk to. `github` is `None` when no token is configured.
///
/// `git` is shared so `ls-remote` can run on the blocking pool.
pub struct StartupProbes<'a, G, R> {
    pub github: Option<&'a G>,
    pub git: Arc<GitOps<R>>,
    pub runner: &'a dyn CommandRunner,
}

#[instrument(skip_all)]
pub async fn validate_startup<G, R>(
    config: &Config,
    probes: StartupProbes<'_, G, R>,
) -> Result<(), PreflightError>
where
    G: GitHubProbe,
    R: CommandRunner + 'static,
{
    let mut errors = Vec::new();

    match (&config.token, probes.github) {
        (Some(token), Some(github)) => {
            match check_token(github).await {
                Ok(login) => info!(login = %login, "GitHub token accepted"),
                Err(m) => errors.push(format!("GitHub token validation failed: {}", m)),
            }

            if errors.is_empty()
                && let Err(m) = check_token_format(token)
            {
                errors.push(format!("GitHub token format validation failed: {}", m));
            }

            if errors.is_empty()
                && let Some(repo) = &config.default_repo
            {
                let access = match check_push_permission(github, repo).await {
                    Ok(()) => {
                        let git = Arc::clone(&probes.git);
                        let repo = repo.clone();
                        tokio::task::spawn_blocking(move || check_git_https(&git, &repo))
                            .await
                            .unwrap_or_else(|e| Err(format!("Git HTTPS check did not complete: {}", e)))
                    }
                    Err(m) => Err(m),
                };
                match access {
                    Ok(()) => info!(repo = %repo, "repository access verified"),
                    Err(m) => errors.push(format!(
                        "GitHub repository access validation failed: {}",
                        m
                    )),
                }
            }
        }
        _ => errors.push(MISSING_TOKEN_MESSAGE.to_string()),
    }

    match &config.openhands_command {
        None => errors.push(MISSING_OPENHANDS_MESSAGE.to_string()),
        Some(command) => {
            if let Err(m) = check_openhands_command(probes.runner, command) {
                errors.push(format!("OpenHands command validation failed: {}", m));
            }
        }
    }

    if let Err(m) = check_llm_settings(&config.llm) {
        errors.push(format!("LLM configuration validation failed: {}", m));
    }

    if errors.is_empty() {
        info!("startup validation passed");
        Ok(())
    } else {
        Err(PreflightError { errors })
    }
}
