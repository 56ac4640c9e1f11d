//! OpenHands CLI provider.
//!
//! The task is written to `<repo>/.swe-worker/task.md` and its path exported as
//! `SWE_WORKER_TASK_FILE`, so wrapper scripts can pick it up as well. The
//! configured command line is split with shell quoting rules (never run through
//! a shell) and extended with the flags OpenHands needs to run unattended.
//!
//! Launch failures and timeouts are reported as failed [`ProviderResult`]s with
//! an actionable summary rather than as errors: from the engine's point of view
//! they are simply runs that did not succeed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument};

use super::{Provider, ProviderResult, Task};
use crate::config::{Config, Secret};
use crate::persistence::write_json_atomic;
use crate::process::{CommandError, CommandRunner, CommandSpec, tail_chars};

/// Characters of combined output kept as the log excerpt.
pub const LOG_EXCERPT_CHARS: usize = 4000;

/// How often a still-running agent is reported in the log.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const TASK_DIR: &str = ".swe-worker";
const TASK_FILE: &str = "task.md";
const TASK_FILE_ENV: &str = "SWE_WORKER_TASK_FILE";

/// Where the OpenHands CLI looks for its LLM configuration, relative to `HOME`.
pub const AGENT_SETTINGS_PATH: &str = ".openhands/agent_settings.json";

const NOT_FOUND_SUMMARY: &str = "OpenHands command was not found. \
     Ensure OPENHANDS_COMMAND points to an executable available in PATH \
     (e.g., 'openhands', 'uv run openhands', or an absolute path).";
const TIMEOUT_SUMMARY: &str =
    "OpenHands command timed out. Increase OPENHANDS_TIMEOUT_SECONDS if needed.";

/// Errors constructing the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("OPENHANDS_COMMAND must not be empty.")]
    EmptyCommand,

    #[error("OPENHANDS_COMMAND could not be parsed (unbalanced quotes): {0}")]
    Unparsable(String),
}

/// Settings for [`OpenHandsProvider`].
#[derive(Debug, Clone)]
pub struct OpenHandsConfig {
    pub command_line: String,
    /// Exported as `HOME` so agent settings survive between runs.
    pub home_dir: PathBuf,
    /// Extra variables for the child (LLM keys and models).
    pub env: Vec<(String, Secret)>,
    pub timeout: Option<Duration>,
}

impl OpenHandsConfig {
    /// Builds the provider settings from process configuration, or `None` when
    /// no agent command is configured.
    pub fn from_config(config: &Config, home_dir: impl Into<PathBuf>) -> Option<Self> {
        let command_line = config.openhands_command.clone()?;
        Some(OpenHandsConfig {
            command_line,
            home_dir: home_dir.into(),
            env: config.llm.passthrough.clone(),
            timeout: config.openhands_timeout,
        })
    }
}

/// Runs the OpenHands CLI against the work tree.
pub struct OpenHandsProvider {
    config: OpenHandsConfig,
    base_args: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl OpenHandsProvider {
    pub fn new(config: OpenHandsConfig, runner: Arc<dyn CommandRunner>) -> Result<Self, ProviderError> {
        let base_args = parse_command_line(&config.command_line)?;
        Ok(OpenHandsProvider {
            config,
            base_args,
            runner,
        })
    }

    /// The configured command plus the flags needed for unattended runs.
    fn effective_args(&self, task_file: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        let has = |flag: &str| self.base_args.iter().any(|a| a == flag);

        if !(has("--file") || has("-f") || has("--task") || has("-t")) {
            args.push("--file".to_string());
            args.push(task_file.to_string_lossy().into_owned());
        }
        if !has("--headless") {
            args.push("--headless".to_string());
        }
        if !(has("--always-approve") || has("--llm-approve")) {
            args.push("--always-approve".to_string());
        }
        if !has("--exit-without-confirmation") {
            args.push("--exit-without-confirmation".to_string());
        }
        args
    }

    fn env_value(&self, key: &str) -> Option<&str> {
        self.config
            .env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.expose().trim())
            .filter(|v| !v.is_empty())
    }

    /// Writes `$HOME/.openhands/agent_settings.json` for the resolved model.
    fn write_agent_settings(&self, selection: &LlmSelection) -> std::io::Result<()> {
        let settings = AgentSettings {
            llm: AgentLlm {
                model: &selection.model,
                api_key: selection.api_key.expose(),
                base_url: selection.base_url.as_deref(),
                usage_id: "agent",
            },
        };
        let path = self.config.home_dir.join(AGENT_SETTINGS_PATH);
        write_json_atomic(&path, &settings)?;
        info!(model = %selection.model, path = %path.display(), "wrote agent settings");
        Ok(())
    }

    fn write_task_file(task: &Task, repo_path: &Path) -> std::io::Result<PathBuf> {
        let dir = repo_path.join(TASK_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(TASK_FILE);
        std::fs::write(&path, task.to_markdown())?;
        Ok(path)
    }
}

impl Provider for OpenHandsProvider {
    #[instrument(skip_all, fields(repo = %task.repo, issue = %task.issue_number))]
    fn run(&self, task: &Task, repo_path: &Path) -> ProviderResult {
        let task_file = match Self::write_task_file(task, repo_path) {
            Ok(path) => path,
            Err(e) => return ProviderResult::failed(format!("Failed to write task file: {}", e), None),
        };

        let selection = match resolve_llm_model(|key| self.env_value(key)) {
            Ok(selection) => selection,
            Err(message) => return ProviderResult::failed(message, None),
        };
        if let Some(selection) = &selection
            && let Err(e) = self.write_agent_settings(selection)
        {
            return ProviderResult::failed(format!("Failed to write agent settings: {}", e), None);
        }

        let args = self.effective_args(&task_file);
        let mut spec = CommandSpec::new(&args[0])
            .args(args[1..].iter().cloned())
            .cwd(repo_path)
            .env(TASK_FILE_ENV, task_file.to_string_lossy())
            .env("HOME", self.config.home_dir.to_string_lossy())
            .timeout(self.config.timeout);
        for (key, value) in &self.config.env {
            spec = spec.env(key.clone(), value.expose());
        }
        if let Some(selection) = &selection {
            spec = spec
                .env("LLM_MODEL", selection.model.as_str())
                .env("LLM_API_KEY", selection.api_key.expose());
            if let Some(base_url) = &selection.base_url {
                spec = spec.env("LLM_BASE_URL", base_url.as_str());
            }
        }

        info!(command = %args.join(" "), repo_dir = %repo_path.display(), "OpenHands started");
        let started = Instant::now();
        let outcome = with_heartbeat(HEARTBEAT_INTERVAL, started, || self.runner.run(&spec));
        info!(elapsed_seconds = started.elapsed().as_secs(), "OpenHands finished");

        let output = match outcome {
            Ok(output) => output,
            Err(CommandError::NotFound { .. }) => {
                return ProviderResult::failed(NOT_FOUND_SUMMARY, None);
            }
            Err(CommandError::TimedOut { .. }) => {
                return ProviderResult::failed(TIMEOUT_SUMMARY, None);
            }
            Err(e) => {
                return ProviderResult::failed(format!("OpenHands command could not be run: {}", e), None);
            }
        };

        let combined = format!("{}\n{}", output.stdout, output.stderr);
        let excerpt = tail_chars(combined.trim(), LOG_EXCERPT_CHARS).to_string();
        let excerpt = (!excerpt.is_empty()).then_some(excerpt);

        if output.success() {
            return ProviderResult::succeeded("OpenHands command completed successfully.", excerpt);
        }

        let exit_code = output.code_or_signal();
        if let Some(text) = &excerpt {
            error!(exit_code, excerpt_tail = %tail_chars(text, 800), "OpenHands command failed");
        }
        ProviderResult::failed(
            format!("OpenHands command failed (exit_code={}).", exit_code),
            excerpt,
        )
    }
}

/// Runs `f`, logging an `info` heartbeat every `interval` until it returns.
fn with_heartbeat<T>(interval: Duration, started: Instant, f: impl FnOnce() -> T) -> T {
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let heartbeat = thread::spawn(move || {
        while let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(interval) {
            info!(elapsed_seconds = started.elapsed().as_secs(), "OpenHands still running");
        }
    });
    let result = f();
    drop(done_tx);
    let _ = heartbeat.join();
    result
}

fn parse_command_line(command_line: &str) -> Result<Vec<String>, ProviderError> {
    let args = shlex::split(command_line)
        .ok_or_else(|| ProviderError::Unparsable(command_line.to_string()))?;
    if args.is_empty() {
        return Err(ProviderError::EmptyCommand);
    }
    Ok(args)
}

/// The model, key and endpoint handed to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSelection {
    /// Always `provider/model`.
    pub model: String,
    pub api_key: Secret,
    pub base_url: Option<String>,
}

#[derive(Serialize)]
struct AgentSettings<'a> {
    llm: AgentLlm<'a>,
}

#[derive(Serialize)]
struct AgentLlm<'a> {
    model: &'a str,
    api_key: &'a str,
    base_url: Option<&'a str>,
    usage_id: &'a str,
}

/// Resolves the model OpenHands should use from its environment.
///
/// Returns `Ok(None)` when no model is requested, `Ok(Some(selection))` when a
/// model and a matching key are available, and `Err(summary)` when the
/// combination cannot work. A bare model name is accepted when exactly one of
/// the OpenAI and Gemini keys is present. `LLM_API_KEY` wins over the
/// provider-specific keys; `LLM_BASE_URL` wins over `OPENAI_BASE_URL`.
pub fn resolve_llm_model<'a>(
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Result<Option<LlmSelection>, String> {
    let mut model = match (lookup("LLM_MODEL"), lookup("OPENAI_MODEL")) {
        (Some(model), _) => model.to_string(),
        (None, Some(openai)) => format!("openai/{}", openai),
        (None, None) => return Ok(None),
    };

    let openai_key = lookup("OPENAI_API_KEY");
    let gemini_key = lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY"));

    if !model.contains('/') {
        model = match (openai_key, gemini_key) {
            (Some(_), Some(_)) => {
                return Err("LLM_MODEL is ambiguous when both OpenAI and Gemini keys are provided. \
                     Use an explicit provider prefix, e.g., 'openai/<model>' or 'gemini/<model>'."
                    .to_string());
            }
            (Some(_), None) => format!("openai/{}", model),
            (None, Some(_)) => format!("gemini/{}", model),
            (None, None) => {
                return Err("LLM_MODEL must include a provider prefix (e.g., 'openai/<model>' or \
                     'gemini/<model>') unless exactly one provider key is configured."
                    .to_string());
            }
        };
    }

    let api_key = lookup("LLM_API_KEY").or_else(|| {
        if model.starts_with("openai/") {
            openai_key
        } else if model.starts_with("gemini/") {
            gemini_key
        } else {
            None
        }
    });
    let Some(api_key) = api_key else {
        return Err("LLM model was specified but no matching API key was provided. \
             Set LLM_API_KEY, or set OPENAI_API_KEY for openai/* models, \
             or set GOOGLE_API_KEY/GEMINI_API_KEY for gemini/* models."
            .to_string());
    };

    Ok(Some(LlmSelection {
        model,
        api_key: Secret::new(api_key),
        base_url: lookup("LLM_BASE_URL")
            .or_else(|| lookup("OPENAI_BASE_URL"))
            .map(str::to_string),
    }))
}
