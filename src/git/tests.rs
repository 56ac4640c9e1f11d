//! Tests for [`GitOps`], against real repositories and against a scripted runner.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::config::Secret;
use crate::process::{CommandOutput, SystemCommandRunner};
use crate::test_utils::ScriptedRunner;

fn identity() -> CommitIdentity {
    CommitIdentity {
        name: "Test Bot".to_string(),
        email: "bot@test.invalid".to_string(),
    }
}

/// Runs git directly, outside the code under test.
fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Seed", "-c", "user.email=seed@test.invalid"])
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare remote at `<tmp>/remote/octo/hello.git` with one commit on `main`,
/// plus a `GitOps` pointed at it.
struct Fixture {
    tmp: TempDir,
    ops: GitOps<SystemCommandRunner>,
    repo: RepoId,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let remote_root = tmp.path().join("remote");
        let bare = remote_root.join("octo").join("hello.git");
        std::fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let seed = tmp.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init"]);
        git(&seed, &["checkout", "-b", "main"]);
        std::fs::write(seed.join("README.md"), "hello\n").unwrap();
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-m", "initial"]);
        git(&seed, &["remote", "add", "origin", bare.to_str().unwrap()]);
        git(&seed, &["push", "origin", "main"]);

        let ops = GitOps::new(SystemCommandRunner::new(), identity(), None)
            .with_remote_base(remote_root.to_string_lossy());
        Fixture {
            tmp,
            ops,
            repo: RepoId::new("octo", "hello"),
        }
    }

    fn bare(&self) -> PathBuf {
        self.tmp.path().join("remote").join("octo").join("hello.git")
    }

    fn seed(&self) -> PathBuf {
        self.tmp.path().join("seed")
    }

    fn clone_dir(&self) -> PathBuf {
        self.tmp.path().join("work").join("repo")
    }

    fn cloned(&self) -> PathBuf {
        let dir = self.clone_dir();
        self.ops.clone_if_needed(&self.repo, &dir, "main").unwrap();
        dir
    }
}

// ─── Real repositories ───

#[test]
fn clone_checkout_commit_push() {
    let fx = Fixture::new();
    let dir = fx.cloned();
    assert!(dir.join("README.md").exists());

    fx.ops
        .ensure_branch_checked_out(&dir, "main", "agent/issue-1")
        .unwrap();
    assert_eq!(git(&dir, &["rev-parse", "--abbrev-ref", "HEAD"]), "agent/issue-1");

    assert_eq!(fx.ops.commit_all_if_dirty(&dir, "nothing").unwrap(), None);

    std::fs::write(dir.join("feature.txt"), "work\n").unwrap();
    let sha = fx
        .ops
        .commit_all_if_dirty(&dir, "Implement #1: feature")
        .unwrap()
        .expect("dirty tree should commit");
    assert_eq!(fx.ops.get_head_sha(&dir).unwrap(), sha);
    assert!(fx.ops.get_status_porcelain(&dir).unwrap().is_empty());
    assert_eq!(git(&dir, &["log", "-1", "--format=%an <%ae>"]), "Test Bot <bot@test.invalid>");

    fx.ops.push_branch(&dir, "agent/issue-1").unwrap();
    assert_eq!(git(&fx.bare(), &["rev-parse", "agent/issue-1"]), sha.as_str());
}

#[test]
fn commit_identity_is_not_persisted() {
    let fx = Fixture::new();
    let dir = fx.cloned();
    fx.ops
        .ensure_branch_checked_out(&dir, "main", "agent/issue-2")
        .unwrap();
    std::fs::write(dir.join("x"), "x").unwrap();
    fx.ops.commit_all_if_dirty(&dir, "msg").unwrap();

    let config = std::fs::read_to_string(dir.join(".git").join("config")).unwrap();
    assert!(!config.contains("Test Bot"));
    assert!(!config.contains("extraheader"));
}

#[test]
fn clone_if_needed_skips_existing_clone() {
    let fx = Fixture::new();
    let dir = fx.cloned();
    std::fs::remove_dir_all(fx.bare()).unwrap();

    // Remote is gone, so a second clone attempt would fail.
    fx.ops.clone_if_needed(&fx.repo, &dir, "main").unwrap();
}

#[test]
fn clone_of_missing_repo_fails_with_command_details() {
    let fx = Fixture::new();
    let err = fx
        .ops
        .clone_if_needed(&RepoId::new("octo", "missing"), &fx.clone_dir(), "main")
        .unwrap_err();
    match err {
        GitError::CommandFailed { message, command, .. } => {
            assert!(message.starts_with("git clone failed"));
            assert!(command.starts_with("git clone --branch main"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn existing_work_branch_is_reused() {
    let fx = Fixture::new();
    let dir = fx.cloned();
    fx.ops
        .ensure_branch_checked_out(&dir, "main", "agent/issue-3")
        .unwrap();
    std::fs::write(dir.join("a.txt"), "a").unwrap();
    let first = fx.ops.commit_all_if_dirty(&dir, "first").unwrap().unwrap();

    fx.ops
        .ensure_branch_checked_out(&dir, "main", "agent/issue-3")
        .unwrap();
    assert_eq!(fx.ops.get_head_sha(&dir).unwrap(), first);
    assert!(dir.join("a.txt").exists());
}

#[test]
fn base_branch_is_reset_to_remote() {
    let fx = Fixture::new();
    let dir = fx.cloned();

    // Local junk on main must be discarded.
    std::fs::write(dir.join("junk.txt"), "junk").unwrap();
    git(&dir, &["add", "-A"]);
    git(&dir, &["commit", "-m", "local junk"]);

    // Remote moves ahead.
    std::fs::write(fx.seed().join("upstream.txt"), "up").unwrap();
    git(&fx.seed(), &["add", "-A"]);
    git(&fx.seed(), &["commit", "-m", "upstream"]);
    git(&fx.seed(), &["push", "origin", "main"]);
    let upstream = git(&fx.seed(), &["rev-parse", "HEAD"]);

    fx.ops
        .ensure_branch_checked_out(&dir, "main", "agent/issue-4")
        .unwrap();
    assert_eq!(fx.ops.get_head_sha(&dir).unwrap().as_str(), upstream);
    assert!(!dir.join("junk.txt").exists());
    assert!(dir.join("upstream.txt").exists());
}

#[test]
fn work_branch_equal_to_base_is_rejected() {
    let fx = Fixture::new();
    let dir = fx.cloned();
    let err = fx
        .ops
        .ensure_branch_checked_out(&dir, "main", "main")
        .unwrap_err();
    assert!(matches!(err, GitError::SameBranch { .. }));
}

// ─── Scripted runner ───

fn scripted(
    respond: impl Fn(&crate::process::CommandSpec) -> CommandOutput + Send + Sync + 'static,
) -> (Arc<ScriptedRunner>, GitOps<Arc<ScriptedRunner>>) {
    let runner = Arc::new(ScriptedRunner::new(move |spec| Ok(respond(spec))));
    let auth = GitAuth::from_token(&Secret::new("ghp_secret"));
    let ops = GitOps::new(Arc::clone(&runner), identity(), Some(auth));
    (runner, ops)
}

#[test]
fn push_passes_auth_header_and_clean_env() {
    let (runner, ops) = scripted(|_| CommandOutput::new(0, "", ""));
    ops.push_branch(Path::new("/repo"), "agent/issue-9").unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let spec = &calls[0];
    assert_eq!(spec.program, "git");
    assert_eq!(spec.args[0], "-c");
    assert!(spec.args[1].starts_with("http.https://github.com/.extraheader=Authorization: Basic "));
    assert_eq!(&spec.args[2..], ["push", "-u", "origin", "agent/issue-9"]);
    assert_eq!(spec.cwd.as_deref(), Some(Path::new("/repo")));
    assert!(spec.env.contains(&("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())));
    assert!(spec.env.contains(&("GIT_CONFIG_GLOBAL".to_string(), "/dev/null".to_string())));
}

#[test]
fn push_permission_failure_is_redacted_and_explained() {
    let (_runner, ops) = scripted(|spec| {
        // Echo the header back, as a misbehaving helper might.
        CommandOutput::new(128, "", format!("remote: Permission denied. {}", spec.args[1]))
    });
    let err = ops
        .push_branch(Path::new("/repo"), "agent/issue-9")
        .unwrap_err();
    let text = err.to_string();

    assert!(text.starts_with(
        "git push failed: Authentication or permission error. \
         Please verify that the GitHub token has 'repo' scope and write access to the repository."
    ));
    assert!(text.contains("exit_code=128"));
    assert!(text.contains("<REDACTED>"));
    assert!(!text.contains("ghp_secret"));
    assert!(!text.contains("Authorization: Basic eC1"));
}

#[test]
fn local_commands_do_not_carry_credentials() {
    let (runner, ops) = scripted(|spec| {
        if spec.args.iter().any(|a| a == "status") {
            CommandOutput::new(0, " M file.txt\n", "")
        } else if spec.args.iter().any(|a| a == "rev-parse") {
            CommandOutput::new(0, "0123456789abcdef\n", "")
        } else {
            CommandOutput::new(0, "", "")
        }
    });
    let sha = ops
        .commit_all_if_dirty(Path::new("/repo"), "Implement #9: thing")
        .unwrap();
    assert_eq!(sha, Some(Sha::new("0123456789abcdef")));

    let calls = runner.calls();
    assert!(calls
        .iter()
        .all(|spec| spec.args.iter().all(|a| !a.contains("extraheader"))));
    let commit = calls
        .iter()
        .find(|spec| spec.args.iter().any(|a| a == "commit"))
        .unwrap();
    assert_eq!(
        commit.args,
        [
            "-c",
            "user.name=Test Bot",
            "-c",
            "user.email=bot@test.invalid",
            "commit",
            "-m",
            "Implement #9: thing"
        ]
    );
}

#[test]
fn empty_head_is_an_error() {
    let (_runner, ops) = scripted(|_| CommandOutput::new(0, "  \n", ""));
    assert!(matches!(
        ops.get_head_sha(Path::new("/repo")),
        Err(GitError::EmptyHead)
    ));
}

#[test]
fn ls_remote_uses_token_free_url() {
    let (runner, ops) = scripted(|_| CommandOutput::new(0, "abc\tHEAD\n", ""));
    ops.verify_remote_access(&RepoId::new("octo", "hello"))
        .unwrap();
    let spec = &runner.calls()[0];
    assert_eq!(&spec.args[2..], ["ls-remote", "https://github.com/octo/hello.git", "HEAD"]);
}
