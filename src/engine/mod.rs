//! The engineer loop: one run of issue → agent → branch → pull request.
//!
//! # Pipeline
//!
//! Every event, whatever its [`EventType`], runs the same steps:
//!
//! 1. mark the state `running` and persist it
//! 2. fetch the issue and the comments newer than the watermark
//! 3. clone the repository if needed, reset the base and check out the work branch
//! 4. hand the task to the [`Provider`]; a failed provider ends the run here
//! 5. run the verification commands
//! 6. commit, and push when something was committed or no PR exists yet
//! 7. open the PR, or make sure the existing one still closes the issue
//! 8. advance the watermark, persist `success`, write the result file
//! 9. post the success comment
//!
//! # Cancellation
//!
//! The token is checked between steps, never inside one. A cancelled run is
//! recorded as failed but posts nothing to the issue.
//!
//! # Failures
//!
//! [`EngineerLoop::run`] never returns an error. Failures are persisted into
//! the state first, then reported to the issue; an error while reporting is
//! logged and dropped.

mod error;
mod event;
mod verify;


pub use error::{PROVIDER_LOG_TAIL_CHARS, RunError, UNHANDLED_PREFIX};
pub use event::{EventType, RunResult, WorkerEvent};
pub use verify::Verifier;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::DEFAULT_BASE_BRANCH;
use crate::git::GitOperations;
use crate::github::{IssuePlatform, NewPullRequest};
use crate::persistence::{StateStore, WorkerState, write_result_snapshot};
use crate::provider::{Provider, Task};
use crate::status::{
    CONSTRAINTS_MARKDOWN, PrBodyInput, PrBodyRenderer, comments_markdown, commit_message,
    error_comment, pr_title, success_comment,
};
use crate::types::{IssueNumber, RepoId};

/// Returned when the first event of a work root does not name an issue.
pub const CONTEXT_REQUIRED_MESSAGE: &str =
    "repo and issue_number are required for initial start.";

const NOT_RUN: &str = "Not run.";

/// Identity of the run, fixed before anything is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub repo: RepoId,
    pub issue: IssueNumber,
    pub base_branch: String,
    pub branch: String,
}

impl RunContext {
    fn from_state(state: &WorkerState) -> Self {
        RunContext {
            repo: state.repo.clone(),
            issue: state.issue_number,
            base_branch: state.base_branch.clone(),
            branch: state.branch.clone(),
        }
    }
}

pub struct EngineerLoop<P, G, V> {
    platform: P,
    git: G,
    provider: V,
    store: StateStore,
    renderer: PrBodyRenderer,
    verifier: Verifier,
}

impl<P, G, V> EngineerLoop<P, G, V>
where
    P: IssuePlatform,
    G: GitOperations,
    V: Provider,
{
    pub fn new(
        platform: P,
        git: G,
        provider: V,
        store: StateStore,
        renderer: PrBodyRenderer,
        verifier: Verifier,
    ) -> Self {
        EngineerLoop {
            platform,
            git,
            provider,
            store,
            renderer,
            verifier,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The persisted identity wins over the event; a fresh work root needs the
    /// event to name repo and issue.
    pub fn resolve_context(&self, event: &WorkerEvent) -> Result<RunContext, RunError> {
        if let Some(state) = self.store.try_load()? {
            return Ok(RunContext::from_state(&state));
        }

        let (Some(repo), Some(issue)) = (event.repo.clone(), event.issue_number) else {
            return Err(RunError::Config(CONTEXT_REQUIRED_MESSAGE.to_string()));
        };
        let base_branch = event
            .base_branch
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string());

        Ok(RunContext {
            branch: issue.work_branch(),
            repo,
            issue,
            base_branch,
        })
    }

    #[instrument(skip_all, fields(event = %event.event_type))]
    pub fn run(&self, event: &WorkerEvent, cancel: &CancellationToken) -> RunResult {
        let ctx = match self.resolve_context(event) {
            Ok(ctx) => ctx,
            Err(err) => {
                let message = err.failure_text();
                error!(error = %message, "cannot resolve run context");
                return RunResult::failed(message);
            }
        };

        info!(
            repo = %ctx.repo,
            issue = %ctx.issue,
            branch = %ctx.branch,
            base = %ctx.base_branch,
            "run started"
        );

        let mut state = match self.begin(&ctx) {
            Ok(state) => state,
            Err(err) => {
                let message = err.failure_text();
                error!(error = %message, "cannot initialize worker state");
                self.report_failure(&ctx, &message);
                return RunResult::failed(message);
            }
        };

        match self.execute(&ctx, &mut state, cancel) {
            Ok(result) => result,
            Err(err) => self.finish_with_error(&ctx, &mut state, err),
        }
    }

    fn begin(&self, ctx: &RunContext) -> Result<WorkerState, RunError> {
        let mut state = self
            .store
            .load_or_initialize(&ctx.repo, ctx.issue, &ctx.base_branch)?;
        state.mark_running();
        self.store.save(&state)?;
        Ok(state)
    }

    fn execute(
        &self,
        ctx: &RunContext,
        state: &mut WorkerState,
        cancel: &CancellationToken,
    ) -> Result<RunResult, RunError> {
        let repo_dir = self.store.paths().repo_dir.as_path();

        checkpoint(cancel)?;
        let issue = self.platform.get_issue(&ctx.repo, ctx.issue)?;
        info!(title = %issue.title, "fetched issue");

        checkpoint(cancel)?;
        let comments =
            self.platform
                .list_issue_comments_since(&ctx.repo, ctx.issue, state.last_seen_comment_id)?;
        let max_comment_id = comments
            .iter()
            .map(|c| c.id)
            .max()
            .unwrap_or(state.last_seen_comment_id);
        info!(count = comments.len(), since = %state.last_seen_comment_id, "listed new comments");

        checkpoint(cancel)?;
        self.git
            .clone_if_needed(&ctx.repo, repo_dir, &ctx.base_branch)?;

        checkpoint(cancel)?;
        self.git
            .ensure_branch_checked_out(repo_dir, &ctx.base_branch, &ctx.branch)?;
        info!(branch = %ctx.branch, "work branch checked out");

        checkpoint(cancel)?;
        let task = Task {
            repo: ctx.repo.clone(),
            issue_number: ctx.issue,
            issue_title: issue.title.clone(),
            issue_body: issue.body.trim().to_string(),
            comments_markdown: comments_markdown(&comments),
            constraints_markdown: CONSTRAINTS_MARKDOWN.to_string(),
        };
        let outcome = self.provider.run(&task, repo_dir);
        if !outcome.success {
            return Err(RunError::ProviderFailed {
                summary: outcome.summary,
                log_excerpt: outcome.log_excerpt,
            });
        }
        info!("provider finished");

        checkpoint(cancel)?;
        let verification = self.verifier.run(repo_dir)?;

        checkpoint(cancel)?;
        let committed = self
            .git
            .commit_all_if_dirty(repo_dir, &commit_message(ctx.issue, &issue.title))?;
        match &committed {
            Some(sha) => info!(sha = %sha.short(), "committed changes"),
            None => info!("working tree clean, nothing committed"),
        }

        if committed.is_some() || state.pr_number.is_none() {
            self.git.push_branch(repo_dir, &ctx.branch)?;
            info!(branch = %ctx.branch, "pushed work branch");
        }

        let head = self.git.get_head_sha(repo_dir)?;
        state.last_head_sha = Some(head);

        let body = self.renderer.render(&PrBodyInput {
            issue_number: ctx.issue,
            summary: &outcome.summary,
            how_to_test: verification.as_deref().unwrap_or(NOT_RUN),
        })?;

        let pr_url = match state.pr_number {
            None => {
                let pr = self.platform.create_pull_request(
                    &ctx.repo,
                    &NewPullRequest {
                        title: pr_title(ctx.issue, &issue.title),
                        head: format!("{}:{}", ctx.repo.owner, ctx.branch),
                        base: ctx.base_branch.clone(),
                        body,
                    },
                )?;
                info!(pr = %pr.number, "opened pull request");
                state.pr_number = Some(pr.number);
                pr.html_url
            }
            Some(number) => {
                let pr = self.platform.get_pull_request(&ctx.repo, number)?;
                if !pr.body.contains(&ctx.issue.closes_line()) {
                    self.platform
                        .update_pull_request_body(&ctx.repo, number, &body)?;
                    info!(pr = %number, "restored closing reference in PR body");
                }
                None
            }
        };

        state.advance_watermark(max_comment_id);
        state.mark_success();
        self.store.save(state)?;
        write_result_snapshot(&self.store.paths().result_file, state, pr_url.as_deref());

        let comment = success_comment(state, pr_url.as_deref(), &outcome.summary, Utc::now());
        self.platform
            .create_issue_comment(&ctx.repo, ctx.issue, &comment)?;

        info!(pr = ?state.pr_number, "run completed");
        Ok(RunResult::succeeded(outcome.summary))
    }

    fn finish_with_error(
        &self,
        ctx: &RunContext,
        state: &mut WorkerState,
        err: RunError,
    ) -> RunResult {
        let message = err.failure_text();
        if err.is_cancelled() {
            warn!(repo = %ctx.repo, issue = %ctx.issue, "run cancelled");
        } else {
            error!(repo = %ctx.repo, issue = %ctx.issue, error = %message, "run failed");
        }

        state.mark_failed(message.clone());
        if let Err(e) = self.store.save(state) {
            error!(error = %e, "failed to persist failed state");
        }
        write_result_snapshot(&self.store.paths().result_file, state, None);

        if !err.is_cancelled() {
            self.report_failure(ctx, &message);
        }
        RunResult::failed(message)
    }

    /// Posts the error comment; a failure here is logged and dropped.
    fn report_failure(&self, ctx: &RunContext, message: &str) {
        if let Err(e) = self
            .platform
            .create_issue_comment(&ctx.repo, ctx.issue, &error_comment(message))
        {
            warn!(error = %e, "failed to post failure comment");
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), RunError> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }
    Ok(())
}
