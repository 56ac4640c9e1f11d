//! Coding agents that change the work tree.
//!
//! A [`Provider`] receives a [`Task`] and the path of the checked-out work
//! branch, edits files in place, and reports back with a [`ProviderResult`].
//! The engine never looks at how the change was made; it only commits whatever
//! the provider left behind.
//!
//! # Implementations
//!
//! - [`OpenHandsProvider`] runs the OpenHands CLI headless as a child process
//! - [`NoopProvider`] always fails with a fixed message; used when no agent is
//!   configured

mod noop;
mod openhands;

pub use noop::NoopProvider;
pub use openhands::{
    AGENT_SETTINGS_PATH, HEARTBEAT_INTERVAL, LOG_EXCERPT_CHARS, LlmSelection, OpenHandsConfig,
    OpenHandsProvider, ProviderError, resolve_llm_model,
};

use std::path::Path;

use crate::types::{IssueNumber, RepoId};

/// Everything the agent is told about the work to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub repo: RepoId,
    pub issue_number: IssueNumber,
    pub issue_title: String,
    pub issue_body: String,
    /// New comments since the last run, already formatted as markdown.
    pub comments_markdown: String,
    pub constraints_markdown: String,
}

impl Task {
    /// Renders the task file handed to the agent.
    pub fn to_markdown(&self) -> String {
        format!(
            "# Task\n\n\
             Repository: {}\n\n\
             Issue: #{} - {}\n\n\
             ## Issue body\n\n{}\n\n\
             ## New comments\n\n{}\n\n\
             ## Constraints\n\n{}\n",
            self.repo,
            self.issue_number.0,
            self.issue_title,
            self.issue_body,
            self.comments_markdown,
            self.constraints_markdown,
        )
    }
}

/// Outcome of one provider run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub success: bool,
    pub summary: String,
    /// Tail of the agent's output, if it produced any.
    pub log_excerpt: Option<String>,
}

impl ProviderResult {
    pub fn succeeded(summary: impl Into<String>, log_excerpt: Option<String>) -> Self {
        ProviderResult {
            success: true,
            summary: summary.into(),
            log_excerpt,
        }
    }

    pub fn failed(summary: impl Into<String>, log_excerpt: Option<String>) -> Self {
        ProviderResult {
            success: false,
            summary: summary.into(),
            log_excerpt,
        }
    }
}

/// A coding agent. Runs synchronously on the engine's blocking thread.
pub trait Provider: Send + Sync {
    fn run(&self, task: &Task, repo_path: &Path) -> ProviderResult;
}

impl<T: Provider + ?Sized> Provider for std::sync::Arc<T> {
    fn run(&self, task: &Task, repo_path: &Path) -> ProviderResult {
        (**self).run(task, repo_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_markdown_layout() {
        let task = Task {
            repo: RepoId::new("octo", "hello"),
            issue_number: IssueNumber(12),
            issue_title: "Add a flag".to_string(),
            issue_body: "Please add --verbose.".to_string(),
            comments_markdown: "### Comment 3\n\nAlso -v".to_string(),
            constraints_markdown: "## Constraints\n- Be nice.".to_string(),
        };
        assert_eq!(
            task.to_markdown(),
            "# Task\n\n\
             Repository: octo/hello\n\n\
             Issue: #12 - Add a flag\n\n\
             ## Issue body\n\nPlease add --verbose.\n\n\
             ## New comments\n\n### Comment 3\n\nAlso -v\n\n\
             ## Constraints\n\n## Constraints\n- Be nice.\n"
        );
    }
}
