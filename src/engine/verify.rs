//! Operator verification commands run after the agent.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::error::RunError;
use crate::process::{CommandRunner, CommandSpec};

/// Runs each configured command with `bash -lc` in the repository, stopping at
/// the first failure.
#[derive(Clone)]
pub struct Verifier {
    runner: Arc<dyn CommandRunner>,
    commands: Vec<String>,
}

impl Verifier {
    pub fn new(runner: Arc<dyn CommandRunner>, commands: Vec<String>) -> Self {
        Verifier { runner, commands }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Returns the transcript, or `None` when nothing is configured.
    pub fn run(&self, repo_dir: &Path) -> Result<Option<String>, RunError> {
        if self.commands.is_empty() {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            debug!(command = %command, "running verification command");
            let spec = CommandSpec::new("bash")
                .args(["-lc", command.as_str()])
                .cwd(repo_dir);

            let (passed, output) = match self.runner.run(&spec) {
                Ok(out) => (out.success(), out.combined_trimmed()),
                Err(e) => (false, e.to_string()),
            };
            entries.push(format!("$ {}\n{}", command, output));

            if !passed {
                info!(command = %command, "verification failed");
                return Err(RunError::VerificationFailed {
                    transcript: transcript(&entries),
                });
            }
        }
        Ok(Some(transcript(&entries)))
    }
}

fn transcript(entries: &[String]) -> String {
    entries.join("\n\n").trim().to_string()
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}
