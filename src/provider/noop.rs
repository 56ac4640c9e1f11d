use std::path::Path;

use super::{Provider, ProviderResult, Task};

/// Message used when no agent command is configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "OpenHands is not configured (set OPENHANDS_COMMAND).";

/// Does nothing and reports failure.
#[derive(Debug, Clone)]
pub struct NoopProvider {
    message: String,
}

impl NoopProvider {
    pub fn new(message: impl Into<String>) -> Self {
        NoopProvider {
            message: message.into(),
        }
    }

    pub fn not_configured() -> Self {
        Self::new(NOT_CONFIGURED_MESSAGE)
    }
}

impl Provider for NoopProvider {
    fn run(&self, _task: &Task, _repo_path: &Path) -> ProviderResult {
        ProviderResult::failed(self.message.clone(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IssueNumber, RepoId};

    #[test]
    fn always_fails_with_message() {
        let task = Task {
            repo: RepoId::new("a", "b"),
            issue_number: IssueNumber(1),
            issue_title: String::new(),
            issue_body: String::new(),
            comments_markdown: String::new(),
            constraints_markdown: String::new(),
        };
        let result = NoopProvider::not_configured().run(&task, Path::new("/nowhere"));
        assert!(!result.success);
        assert_eq!(result.summary, NOT_CONFIGURED_MESSAGE);
        assert_eq!(result.log_excerpt, None);
    }
}
