//! Shared test doubles: a scripted command runner and in-memory fakes for the
//! platform, git and provider seams of the engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::git::{GitError, GitOperations, GitResult};
use crate::github::{
    GitHubApiError, Issue, IssueComment, IssuePlatform, NewPullRequest, PullRequest,
    comments_after,
};
use crate::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::provider::{Provider, ProviderResult, Task};
use crate::types::{CommentId, IssueNumber, PrNumber, RepoId, Sha};

// ─── Command runner ───

type Respond = dyn Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync;

/// Answers every command with a closure and records what was asked.
pub struct ScriptedRunner {
    respond: Box<Respond>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(
        respond: impl Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    ) -> Self {
        ScriptedRunner {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.respond)(spec)
    }
}

// ─── Platform ───

#[derive(Debug, Default)]
struct PlatformData {
    issue: Option<Issue>,
    comments: Vec<IssueComment>,
    pulls: HashMap<PrNumber, PullRequest>,
    created_pulls: Vec<NewPullRequest>,
    issue_comments: Vec<String>,
    body_updates: Vec<(PrNumber, String)>,
    calls: Vec<String>,
    failures: HashMap<&'static str, (Option<u16>, String)>,
    next_pr: u64,
}

/// In-memory issue tracker.
///
/// Operation names accepted by [`FakePlatform::fail`]: `get_issue`,
/// `list_comments`, `create_issue_comment`, `create_pull_request`,
/// `get_pull_request`, `update_pull_request_body`.
#[derive(Debug)]
pub struct FakePlatform {
    data: Mutex<PlatformData>,
}

impl FakePlatform {
    pub fn new(issue: IssueNumber, title: &str, body: &str) -> Self {
        FakePlatform {
            data: Mutex::new(PlatformData {
                issue: Some(Issue {
                    number: issue,
                    title: title.to_string(),
                    body: body.to_string(),
                }),
                next_pr: 99,
                ..Default::default()
            }),
        }
    }

    pub fn add_comment(&self, id: u64, body: &str) {
        self.data.lock().unwrap().comments.push(IssueComment {
            id: CommentId(id),
            body: body.to_string(),
        });
    }

    /// Registers an already open PR.
    pub fn add_pull_request(&self, number: u64, body: &str) {
        let pr = PullRequest {
            number: PrNumber(number),
            html_url: Some(format!("https://github.com/octo/hello/pull/{}", number)),
            body: body.to_string(),
        };
        self.data.lock().unwrap().pulls.insert(pr.number, pr);
    }

    pub fn fail(&self, operation: &'static str, status: Option<u16>, message: &str) {
        self.data
            .lock()
            .unwrap()
            .failures
            .insert(operation, (status, message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    pub fn created_pulls(&self) -> Vec<NewPullRequest> {
        self.data.lock().unwrap().created_pulls.clone()
    }

    pub fn issue_comments(&self) -> Vec<String> {
        self.data.lock().unwrap().issue_comments.clone()
    }

    pub fn body_updates(&self) -> Vec<(PrNumber, String)> {
        self.data.lock().unwrap().body_updates.clone()
    }

    fn enter(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, PlatformData>, GitHubApiError> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(operation.to_string());
        if let Some((status, message)) = data.failures.get(operation) {
            return Err(GitHubApiError::new(*status, message.clone()));
        }
        Ok(data)
    }
}

impl IssuePlatform for FakePlatform {
    fn get_issue(&self, _repo: &RepoId, issue: IssueNumber) -> crate::github::Result<Issue> {
        let data = self.enter("get_issue")?;
        data.issue
            .clone()
            .filter(|i| i.number == issue)
            .ok_or_else(|| GitHubApiError::new(Some(404), "Not Found"))
    }

    fn list_issue_comments_since(
        &self,
        _repo: &RepoId,
        _issue: IssueNumber,
        since: CommentId,
    ) -> crate::github::Result<Vec<IssueComment>> {
        let data = self.enter("list_comments")?;
        Ok(comments_after(data.comments.clone(), since))
    }

    fn create_issue_comment(
        &self,
        _repo: &RepoId,
        _issue: IssueNumber,
        body: &str,
    ) -> crate::github::Result<()> {
        let mut data = self.enter("create_issue_comment")?;
        data.issue_comments.push(body.to_string());
        Ok(())
    }

    fn create_pull_request(
        &self,
        _repo: &RepoId,
        request: &NewPullRequest,
    ) -> crate::github::Result<PullRequest> {
        let mut data = self.enter("create_pull_request")?;
        let number = PrNumber(data.next_pr);
        data.next_pr += 1;
        let pr = PullRequest {
            number,
            html_url: Some(format!("https://github.com/octo/hello/pull/{}", number.0)),
            body: request.body.clone(),
        };
        data.created_pulls.push(request.clone());
        data.pulls.insert(number, pr.clone());
        Ok(pr)
    }

    fn get_pull_request(&self, _repo: &RepoId, pr: PrNumber) -> crate::github::Result<PullRequest> {
        let data = self.enter("get_pull_request")?;
        data.pulls
            .get(&pr)
            .cloned()
            .ok_or_else(|| GitHubApiError::new(Some(404), "Not Found"))
    }

    fn update_pull_request_body(
        &self,
        _repo: &RepoId,
        pr: PrNumber,
        body: &str,
    ) -> crate::github::Result<()> {
        let mut data = self.enter("update_pull_request_body")?;
        data.body_updates.push((pr, body.to_string()));
        if let Some(existing) = data.pulls.get_mut(&pr) {
            existing.body = body.to_string();
        }
        Ok(())
    }

    fn create_pull_request_comment(
        &self,
        _repo: &RepoId,
        _pr: PrNumber,
        _body: &str,
    ) -> crate::github::Result<()> {
        self.enter("create_pull_request_comment")?;
        Ok(())
    }
}

// ─── Git ───

#[derive(Debug)]
struct GitData {
    calls: Vec<String>,
    /// Results handed out by successive `commit_all_if_dirty` calls; an empty
    /// queue means the tree is clean.
    commits: Vec<Sha>,
    head: Sha,
    failures: HashMap<&'static str, String>,
}

/// Records git operations without touching a repository.
///
/// Call names: `clone`, `checkout`, `commit`, `push`, `head`, `status`.
#[derive(Debug)]
pub struct FakeGit {
    data: Mutex<GitData>,
}

impl Default for FakeGit {
    fn default() -> Self {
        FakeGit {
            data: Mutex::new(GitData {
                calls: Vec::new(),
                commits: Vec::new(),
                head: Sha::new("abc123"),
                failures: HashMap::new(),
            }),
        }
    }
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit produce `sha` (and move HEAD there).
    pub fn queue_commit(&self, sha: &str) {
        self.data.lock().unwrap().commits.push(Sha::new(sha));
    }

    pub fn fail(&self, operation: &'static str, message: &str) {
        self.data
            .lock()
            .unwrap()
            .failures
            .insert(operation, message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    fn enter(&self, call: String, operation: &'static str) -> GitResult<std::sync::MutexGuard<'_, GitData>> {
        let mut data = self.data.lock().unwrap();
        data.calls.push(call);
        if let Some(message) = data.failures.get(operation) {
            return Err(GitError::command_failed(
                message.clone(),
                format!("git {}", operation),
                Some(1),
                "",
            ));
        }
        Ok(data)
    }
}

impl GitOperations for FakeGit {
    fn clone_if_needed(&self, repo: &RepoId, _dest: &Path, base_branch: &str) -> GitResult<()> {
        self.enter(format!("clone {} {}", repo, base_branch), "clone")?;
        Ok(())
    }

    fn ensure_branch_checked_out(
        &self,
        _repo_dir: &Path,
        base_branch: &str,
        branch: &str,
    ) -> GitResult<()> {
        self.enter(format!("checkout {} {}", base_branch, branch), "checkout")?;
        if branch == base_branch {
            return Err(GitError::SameBranch {
                branch: branch.to_string(),
            });
        }
        Ok(())
    }

    fn commit_all_if_dirty(&self, _repo_dir: &Path, message: &str) -> GitResult<Option<Sha>> {
        let mut data = self.enter(format!("commit {}", message), "commit")?;
        if data.commits.is_empty() {
            return Ok(None);
        }
        let sha = data.commits.remove(0);
        data.head = sha.clone();
        Ok(Some(sha))
    }

    fn push_branch(&self, _repo_dir: &Path, branch: &str) -> GitResult<()> {
        self.enter(format!("push {}", branch), "push")?;
        Ok(())
    }

    fn get_head_sha(&self, _repo_dir: &Path) -> GitResult<Sha> {
        let data = self.enter("head".to_string(), "head")?;
        Ok(data.head.clone())
    }

    fn get_status_porcelain(&self, _repo_dir: &Path) -> GitResult<String> {
        self.enter("status".to_string(), "status")?;
        Ok(String::new())
    }
}

// ─── Provider ───

/// Returns a fixed result and remembers the tasks it was given.
pub struct FakeProvider {
    result: ProviderResult,
    cancel_during_run: Option<CancellationToken>,
    tasks: Mutex<Vec<Task>>,
}

impl FakeProvider {
    pub fn succeeding(summary: &str) -> Self {
        Self::with_result(ProviderResult::succeeded(summary, None))
    }

    pub fn with_result(result: ProviderResult) -> Self {
        FakeProvider {
            result,
            cancel_during_run: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Cancels `token` while "running", as if a stop arrived mid-run.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_during_run = Some(token);
        self
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

impl Provider for FakeProvider {
    fn run(&self, task: &Task, _repo_path: &Path) -> ProviderResult {
        self.tasks.lock().unwrap().push(task.clone());
        if let Some(token) = &self.cancel_during_run {
            token.cancel();
        }
        self.result.clone()
    }
}
