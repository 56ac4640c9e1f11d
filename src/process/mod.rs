//! Running child processes with an optional timeout and captured output.
//!
//! Everything the bot shells out to (git, verification commands, the coding
//! agent) goes through the [`CommandRunner`] trait so that callers can be tested
//! against a scripted runner instead of real processes.
//!
//! Output is drained on reader threads while the child runs, so a chatty child
//! can never deadlock on a full pipe. Only the last `output_limit_bytes` of each
//! stream are retained, since diagnostics live at the end of a log.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Default number of bytes retained per stream.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 4 * 1024 * 1024;

/// Errors from launching or supervising a child process.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The executable could not be found.
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// The process could not be spawned for another reason.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process exceeded its timeout and was killed.
    #[error("command timed out after {}s: {program}", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    /// IO error while waiting for the process or reading its output.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A fully described process invocation. Arguments are passed directly, never
/// through a shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Convenience constructor, mostly for scripted runners.
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        CommandOutput {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code for display; `-1` stands for "killed by signal".
    pub fn code_or_signal(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined_trimmed(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// Something that can run a [`CommandSpec`] to completion.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        (**self).run(spec)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        (**self).run(spec)
    }
}

/// Runs real OS processes.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    output_limit_bytes: usize,
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCommandRunner {
    pub fn new() -> Self {
        SystemCommandRunner {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }
}

impl CommandRunner for SystemCommandRunner {
    #[instrument(skip_all, fields(program = %spec.program))]
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning child process");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CommandError::NotFound {
                    program: spec.program.clone(),
                }
            } else {
                CommandError::Spawn {
                    program: spec.program.clone(),
                    source: e,
                }
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not piped"))?;

        let limit = self.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_stream_tail(stdout, limit));
        let stderr_handle = thread::spawn(move || read_stream_tail(stderr, limit));

        let status = match spec.timeout {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                    child.kill()?;
                    child.wait()?;
                    // Drain readers so the threads do not outlive the child.
                    let _ = join_output(stdout_handle);
                    let _ = join_output(stderr_handle);
                    return Err(CommandError::TimedOut {
                        program: spec.program.clone(),
                        timeout,
                    });
                }
            },
            None => child.wait()?,
        };

        let (stdout, stdout_truncated) = join_output(stdout_handle)?;
        let (stderr, stderr_truncated) = join_output(stderr_handle)?;
        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        debug!(exit_code = ?status.code(), "command finished");
        Ok(CommandOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn join_output(handle: thread::JoinHandle<io::Result<(Vec<u8>, usize)>>) -> io::Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("output reader thread panicked")),
    }
}

/// Reads a stream to the end, keeping only the last `limit` bytes.
/// Returns the retained bytes and how many were discarded from the front.
fn read_stream_tail<R: Read>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut discarded = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > limit {
            let excess = buf.len() - limit;
            buf.drain(..excess);
            discarded += excess;
        }
    }

    Ok((buf, discarded))
}

/// Returns the last `max_chars` characters of `text`.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
