//! What triggers a run and what a run reports back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{IssueNumber, RepoId};

/// Why an event was sent. Every kind runs the same pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Start,
    Rerun,
    CommentAdded,
    ReviewChanges,
    CiFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "start",
            EventType::Rerun => "rerun",
            EventType::CommentAdded => "comment_added",
            EventType::ReviewChanges => "review_changes",
            EventType::CiFailed => "ci_failed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued request to run the loop.
///
/// `repo` and `issue_number` only matter for the first event of a work root;
/// after that the state file decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerEvent {
    pub event_type: EventType,
    pub repo: Option<RepoId>,
    pub issue_number: Option<IssueNumber>,
    pub base_branch: Option<String>,
}

impl WorkerEvent {
    pub fn new(event_type: EventType) -> Self {
        WorkerEvent {
            event_type,
            repo: None,
            issue_number: None,
            base_branch: None,
        }
    }

    pub fn start(repo: RepoId, issue_number: IssueNumber) -> Self {
        WorkerEvent {
            repo: Some(repo),
            issue_number: Some(issue_number),
            ..Self::new(EventType::Start)
        }
    }

    pub fn with_base_branch(mut self, base_branch: impl Into<String>) -> Self {
        self.base_branch = Some(base_branch.into());
        self
    }
}

/// Outcome returned to the caller. The durable record lives in the state and
/// result files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
}

impl RunResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        RunResult {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RunResult {
            success: false,
            message: message.into(),
        }
    }
}
