//! Why a run stopped early.

use thiserror::Error;

use crate::git::GitError;
use crate::github::GitHubApiError;
use crate::persistence::StateError;
use crate::process::tail_chars;
use crate::status::RenderError;

/// Characters of provider output kept in the failure message.
pub const PROVIDER_LOG_TAIL_CHARS: usize = 2000;

/// Prefix recorded in `last_error` for errors outside the known taxonomy.
pub const UNHANDLED_PREFIX: &str = "Unhandled error: ";

#[derive(Debug, Error)]
pub enum RunError {
    /// A stop was requested; observed at a checkpoint between steps.
    #[error("Stop requested.")]
    Cancelled,

    /// The event cannot be turned into a run context.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("{}", describe_provider_failure(.summary, .log_excerpt))]
    ProviderFailed {
        summary: String,
        log_excerpt: Option<String>,
    },

    #[error("Verification command failed.\n\n{transcript}")]
    VerificationFailed { transcript: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{0}")]
    Unhandled(String),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }

    /// Errors with a structured cause that is reported as-is.
    pub fn is_known(&self) -> bool {
        matches!(
            self,
            RunError::Config(_)
                | RunError::GitHub(_)
                | RunError::Git(_)
                | RunError::ProviderFailed { .. }
                | RunError::VerificationFailed { .. }
        )
    }

    /// Text stored in `last_error`.
    pub fn failure_text(&self) -> String {
        if self.is_cancelled() || self.is_known() {
            self.to_string()
        } else {
            format!("{}{}", UNHANDLED_PREFIX, self)
        }
    }
}

fn describe_provider_failure(summary: &str, log_excerpt: &Option<String>) -> String {
    let excerpt = log_excerpt
        .as_deref()
        .map(|log| tail_chars(log.trim(), PROVIDER_LOG_TAIL_CHARS))
        .unwrap_or("");
    if excerpt.is_empty() {
        return format!("Provider failed: {}", summary);
    }
    format!(
        "Provider failed.\n\nSummary:\n{}\n\nLog excerpt:\n```\n{}\n```",
        summary, excerpt
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failure_without_output() {
        let err = RunError::ProviderFailed {
            summary: "build broke".to_string(),
            log_excerpt: None,
        };
        assert_eq!(err.to_string(), "Provider failed: build broke");

        let blank = RunError::ProviderFailed {
            summary: "build broke".to_string(),
            log_excerpt: Some("  \n".to_string()),
        };
        assert_eq!(blank.to_string(), "Provider failed: build broke");
    }

    #[test]
    fn provider_failure_keeps_log_tail() {
        let log = format!("{}LAST LINE", "x".repeat(5000));
        let err = RunError::ProviderFailed {
            summary: "build broke".to_string(),
            log_excerpt: Some(log),
        };
        let text = err.to_string();
        assert!(text.starts_with("Provider failed.\n\nSummary:\nbuild broke\n\nLog excerpt:\n```\n"));
        assert!(text.ends_with("LAST LINE\n```"));
        let fenced = text.split("```\n").nth(1).unwrap();
        assert_eq!(fenced.trim_end_matches("\n```").chars().count(), PROVIDER_LOG_TAIL_CHARS);
    }

    #[test]
    fn classification() {
        assert!(RunError::Cancelled.is_cancelled());
        assert!(!RunError::Cancelled.is_known());
        assert_eq!(RunError::Cancelled.failure_text(), "Stop requested.");

        let git = RunError::from(GitError::EmptyHead);
        assert!(git.is_known());
        assert_eq!(git.failure_text(), "Failed to read HEAD sha.");

        let github = RunError::from(GitHubApiError::new(Some(401), "Bad credentials"));
        assert_eq!(
            github.failure_text(),
            "GitHub API error: status=401, message=Bad credentials"
        );

        let unhandled = RunError::Unhandled("boom".to_string());
        assert!(!unhandled.is_known());
        assert_eq!(unhandled.failure_text(), "Unhandled error: boom");

        let state = RunError::from(StateError::Io(std::io::Error::other("disk full")));
        assert_eq!(state.failure_text(), "Unhandled error: state IO error: disk full");
    }
}
