//! Machine-readable outcome of the most recent run (`out/result.json`).
//!
//! Written after every run, whatever the outcome. The write is best-effort: a
//! failure is logged and swallowed so that it can never replace the run's real
//! error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::atomic::write_json_atomic;
use super::state::{RunStatus, WorkerState};
use crate::types::{CommentId, IssueNumber, PrNumber, RepoId, Sha};

/// Contents of the result file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResultSnapshot {
    pub repo: RepoId,
    pub issue_number: IssueNumber,
    pub base_branch: String,
    pub branch: String,
    pub pr_number: Option<PrNumber>,
    /// Only known when the PR was created during this run.
    pub pr_url: Option<String>,
    pub last_seen_comment_id: CommentId,
    pub last_head_sha: Option<Sha>,
    pub last_run_status: RunStatus,
    pub last_error: Option<String>,
}

impl RunResultSnapshot {
    pub fn from_state(state: &WorkerState, pr_url: Option<&str>) -> Self {
        RunResultSnapshot {
            repo: state.repo.clone(),
            issue_number: state.issue_number,
            base_branch: state.base_branch.clone(),
            branch: state.branch.clone(),
            pr_number: state.pr_number,
            pr_url: pr_url.map(String::from),
            last_seen_comment_id: state.last_seen_comment_id,
            last_head_sha: state.last_head_sha.clone(),
            last_run_status: state.last_run_status,
            last_error: state.last_error.clone(),
        }
    }
}

/// Writes the result snapshot, logging instead of failing.
pub fn write_result_snapshot(path: &Path, state: &WorkerState, pr_url: Option<&str>) {
    let snapshot = RunResultSnapshot::from_state(state, pr_url);
    if let Err(e) = write_json_atomic(path, &snapshot) {
        warn!(path = %path.display(), error = %e, "failed to write result snapshot");
    }
}
