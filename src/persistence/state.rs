//! Durable run state for a single (repo, issue) pair.
//!
//! # Lifecycle
//!
//! The state file is created by the first event for a work root
//! ([`StateStore::load_or_initialize`]) and afterwards only ever loaded,
//! mutated in place, and saved back. It is never replaced wholesale, so fields
//! untouched by a failing run survive that failure.
//!
//! # Invariants
//!
//! - `repo`, `issue_number` and `branch` never change once written.
//! - `pr_number` goes from `None` to `Some` at most once.
//! - `last_seen_comment_id` never decreases (see [`WorkerState::advance_watermark`]).
//! - `last_error` is `Some` only while `last_run_status` is `failed`.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::atomic::write_json_atomic;
use super::paths::WorkPaths;
use crate::types::{CommentId, IssueNumber, PrNumber, RepoId, Sha};

/// Errors from reading or writing the state file.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state IO error: {0}")]
    Io(#[from] io::Error),

    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Outcome of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted worker state. Field names are the on-disk JSON keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub repo: RepoId,
    pub issue_number: IssueNumber,
    pub base_branch: String,
    pub branch: String,

    #[serde(default)]
    pub pr_number: Option<PrNumber>,
    #[serde(default = "zero_comment_id")]
    pub last_seen_comment_id: CommentId,
    #[serde(default)]
    pub last_head_sha: Option<Sha>,

    #[serde(default)]
    pub last_run_status: RunStatus,
    #[serde(default)]
    pub last_error: Option<String>,
}

fn zero_comment_id() -> CommentId {
    CommentId(0)
}

impl WorkerState {
    /// Fresh state: idle, no PR, watermark 0, branch derived from the issue.
    pub fn new(repo: RepoId, issue_number: IssueNumber, base_branch: impl Into<String>) -> Self {
        WorkerState {
            branch: issue_number.work_branch(),
            repo,
            issue_number,
            base_branch: base_branch.into(),
            pr_number: None,
            last_seen_comment_id: CommentId(0),
            last_head_sha: None,
            last_run_status: RunStatus::Idle,
            last_error: None,
        }
    }

    /// Moves the watermark to `max(current, observed)`.
    pub fn advance_watermark(&mut self, observed: CommentId) {
        self.last_seen_comment_id = self.last_seen_comment_id.max(observed);
    }

    pub fn mark_running(&mut self) {
        self.last_run_status = RunStatus::Running;
        self.last_error = None;
    }

    pub fn mark_success(&mut self) {
        self.last_run_status = RunStatus::Success;
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.last_run_status = RunStatus::Failed;
        self.last_error = Some(error.into());
    }
}

/// Reads and writes the single state file of a work root.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: WorkPaths,
}

impl StateStore {
    pub fn new(paths: WorkPaths) -> Self {
        StateStore { paths }
    }

    pub fn paths(&self) -> &WorkPaths {
        &self.paths
    }

    /// Creates every directory of the work root layout.
    pub fn ensure_directories(&self) -> Result<()> {
        self.paths.ensure_directories()?;
        Ok(())
    }

    /// Whether a state file has been written for this work root.
    pub fn exists(&self) -> bool {
        self.paths.state_file.exists()
    }

    pub fn load(&self) -> Result<WorkerState> {
        let bytes = std::fs::read(&self.paths.state_file)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads the state, returning `None` if no state file exists yet.
    pub fn try_load(&self) -> Result<Option<WorkerState>> {
        match self.load() {
            Ok(state) => Ok(Some(state)),
            Err(StateError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the existing state unchanged, or creates, persists and returns
    /// a fresh one. Calling this repeatedly never modifies an existing file.
    pub fn load_or_initialize(
        &self,
        repo: &RepoId,
        issue_number: IssueNumber,
        base_branch: &str,
    ) -> Result<WorkerState> {
        self.ensure_directories()?;
        if let Some(state) = self.try_load()? {
            return Ok(state);
        }

        debug!(repo = %repo, issue = %issue_number, "initializing worker state");
        let state = WorkerState::new(repo.clone(), issue_number, base_branch);
        self.save(&state)?;
        Ok(state)
    }

    /// Atomically replaces the state file.
    pub fn save(&self, state: &WorkerState) -> Result<()> {
        write_json_atomic(&self.paths.state_file, state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::atomic::tmp_path_for;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn arb_state() -> impl Strategy<Value = WorkerState> {
        (
            "[a-z][a-z0-9-]{0,20}",
            "[a-z][a-z0-9_-]{0,20}",
            1u64..100_000,
            "[a-z][a-z0-9/_-]{0,20}",
            proptest::option::of(1u64..100_000),
            any::<u64>(),
            proptest::option::of("[0-9a-f]{40}"),
            prop_oneof![
                Just(RunStatus::Idle),
                Just(RunStatus::Running),
                Just(RunStatus::Success),
                Just(RunStatus::Failed),
            ],
            proptest::option::of(".{0,200}"),
        )
            .prop_map(
                |(owner, name, issue, base, pr, seen, sha, status, error)| WorkerState {
                    repo: RepoId::new(owner, name),
                    issue_number: IssueNumber(issue),
                    base_branch: base,
                    branch: IssueNumber(issue).work_branch(),
                    pr_number: pr.map(PrNumber),
                    last_seen_comment_id: CommentId(seen),
                    last_head_sha: sha.map(Sha::new),
                    last_run_status: status,
                    last_error: error,
                },
            )
    }

    fn store() -> (StateStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = StateStore::new(WorkPaths::new(dir.path()));
        (store, dir)
    }

    // ─── Property tests ───

    proptest! {
        #[test]
        fn save_load_roundtrip(state in arb_state()) {
            let (store, _dir) = store();
            store.save(&state).unwrap();
            let loaded = store.load().unwrap();
            prop_assert_eq!(state, loaded);
        }

        #[test]
        fn no_tmp_file_after_save(state in arb_state()) {
            let (store, _dir) = store();
            store.save(&state).unwrap();
            prop_assert!(!tmp_path_for(&store.paths().state_file).exists());
        }

        #[test]
        fn watermark_never_decreases(
            initial in any::<u64>(),
            observations in proptest::collection::vec(any::<u64>(), 0..20)
        ) {
            let mut state = WorkerState::new(RepoId::new("o", "r"), IssueNumber(1), "main");
            state.last_seen_comment_id = CommentId(initial);
            let mut expected = initial;
            for observed in observations {
                let before = state.last_seen_comment_id;
                state.advance_watermark(CommentId(observed));
                expected = expected.max(observed);
                prop_assert!(state.last_seen_comment_id >= before);
                prop_assert_eq!(state.last_seen_comment_id, CommentId(expected));
            }
        }
    }

    // ─── Unit tests ───

    #[test]
    fn new_state_defaults() {
        let state = WorkerState::new(RepoId::new("octocat", "hello"), IssueNumber(123), "main");
        assert_eq!(state.branch, "agent/issue-123");
        assert_eq!(state.pr_number, None);
        assert_eq!(state.last_seen_comment_id, CommentId(0));
        assert_eq!(state.last_head_sha, None);
        assert_eq!(state.last_run_status, RunStatus::Idle);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn json_shape_matches_file_format() {
        let mut state = WorkerState::new(RepoId::new("octocat", "hello"), IssueNumber(7), "main");
        state.pr_number = Some(PrNumber(99));
        state.mark_failed("boom");

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "repo": "octocat/hello",
                "issue_number": 7,
                "base_branch": "main",
                "branch": "agent/issue-7",
                "pr_number": 99,
                "last_seen_comment_id": 0,
                "last_head_sha": null,
                "last_run_status": "failed",
                "last_error": "boom",
            })
        );
    }

    #[test]
    fn load_or_initialize_creates_once() {
        let (store, _dir) = store();
        assert!(!store.exists());

        let repo = RepoId::new("octocat", "hello");
        let first = store
            .load_or_initialize(&repo, IssueNumber(5), "main")
            .unwrap();
        assert!(store.exists());
        assert_eq!(first.last_run_status, RunStatus::Idle);

        let mut modified = first.clone();
        modified.pr_number = Some(PrNumber(12));
        modified.last_seen_comment_id = CommentId(40);
        store.save(&modified).unwrap();

        // Different arguments must not override existing state.
        let again = store
            .load_or_initialize(&RepoId::new("other", "repo"), IssueNumber(6), "dev")
            .unwrap();
        assert_eq!(again, modified);
    }

    #[test]
    fn try_load_missing_is_none() {
        let (store, _dir) = store();
        assert!(store.try_load().unwrap().is_none());
    }

    #[test]
    fn load_invalid_json_is_error() {
        let (store, _dir) = store();
        store.ensure_directories().unwrap();
        std::fs::write(&store.paths().state_file, "{not json").unwrap();
        assert!(matches!(store.load(), Err(StateError::Json(_))));
        assert!(matches!(store.try_load(), Err(StateError::Json(_))));
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let (store, _dir) = store();
        store.ensure_directories().unwrap();
        std::fs::write(
            &store.paths().state_file,
            r#"{"repo":"a/b","issue_number":3,"base_branch":"main","branch":"agent/issue-3"}"#,
        )
        .unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.last_seen_comment_id, CommentId(0));
        assert_eq!(state.last_run_status, RunStatus::Idle);
    }

    #[test]
    fn status_transitions_manage_error() {
        let mut state = WorkerState::new(RepoId::new("a", "b"), IssueNumber(1), "main");
        state.mark_failed("bad");
        assert_eq!(state.last_error.as_deref(), Some("bad"));
        state.mark_running();
        assert_eq!(state.last_run_status, RunStatus::Running);
        assert_eq!(state.last_error, None);
        state.mark_failed("bad again");
        state.mark_success();
        assert_eq!(state.last_run_status, RunStatus::Success);
        assert_eq!(state.last_error, None);
    }
}
