//! Environment-derived configuration.
//!
//! All settings come from environment variables. [`Config::from_env`] reads the
//! real process environment; [`Config::from_lookup`] takes any key lookup so
//! parsing can be tested without mutating global state.
//!
//! Values are trimmed and empty strings are treated as unset, so
//! `REPO=` in a compose file behaves the same as not setting `REPO` at all.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::types::{IssueNumber, RepoId};

/// Default GitHub REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Default base branch when neither the event nor the environment names one.
pub const DEFAULT_BASE_BRANCH: &str = "main";

const DEFAULT_AUTHOR_NAME: &str = "swe-worker-bot";
const DEFAULT_AUTHOR_EMAIL: &str = "swe-worker-bot@example.com";
const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
const DEFAULT_LISTEN_PORT: u16 = 8000;

/// LLM-related variables forwarded verbatim to the coding agent.
const PROVIDER_PASSTHROUGH_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "LLM_API_KEY",
    "LLM_BASE_URL",
    "LLM_MODEL",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
];

/// Errors from parsing configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but its value cannot be parsed.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// A secret string whose `Debug` output never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// LLM settings passed through to the coding agent and checked at startup.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub llm_model: Option<String>,
    pub openai_model: Option<String>,
    pub openai_api_key: Option<Secret>,
    pub google_api_key: Option<Secret>,
    pub gemini_api_key: Option<Secret>,
    /// Every pass-through variable that was set, in a stable order.
    pub passthrough: Vec<(String, Secret)>,
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform token (`GITHUB_TOKEN`, falling back to `ENGINEER_PAT_KEY`).
    pub token: Option<Secret>,
    pub api_base_url: String,

    /// Defaults used when an event payload omits them.
    pub default_repo: Option<RepoId>,
    pub default_issue: Option<IssueNumber>,
    pub default_base_branch: Option<String>,

    pub git_author_name: String,
    pub git_author_email: String,

    /// Operator verification commands, run in order after the agent.
    pub verify_commands: Vec<String>,

    pub work_root: PathBuf,

    /// Agent command line; `None` means no agent is configured.
    pub openhands_command: Option<String>,
    pub openhands_timeout: Option<Duration>,
    pub llm: LlmSettings,

    pub pr_template_path: Option<PathBuf>,

    pub listen_host: String,
    pub listen_port: u16,
    pub skip_startup_validation: bool,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| normalize(lookup(key));

        let token = get("GITHUB_TOKEN")
            .or_else(|| get("ENGINEER_PAT_KEY"))
            .map(Secret::new);

        let default_repo = get("REPO")
            .map(|raw| {
                RepoId::parse(&raw).map_err(|e| ConfigError::Invalid {
                    key: "REPO",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let default_issue = get("ISSUE_NUMBER")
            .map(|raw| parse_positive("ISSUE_NUMBER", &raw).map(IssueNumber))
            .transpose()?;

        let openhands_timeout = get("OPENHANDS_TIMEOUT_SECONDS")
            .map(|raw| parse_positive("OPENHANDS_TIMEOUT_SECONDS", &raw).map(Duration::from_secs))
            .transpose()?;

        let listen_port = match get("LISTEN_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "LISTEN_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_LISTEN_PORT,
        };

        let work_root = match get("WORK_ROOT") {
            Some(raw) => PathBuf::from(raw),
            None => default_work_root(get("CI").as_deref() == Some("true")),
        };

        let passthrough = PROVIDER_PASSTHROUGH_KEYS
            .iter()
            .filter_map(|&key| get(key).map(|v| (key.to_string(), Secret::new(v))))
            .collect();

        Ok(Config {
            token,
            api_base_url: get("GITHUB_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            default_repo,
            default_issue,
            default_base_branch: get("BASE_BRANCH"),
            git_author_name: get("GIT_AUTHOR_NAME")
                .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
            git_author_email: get("GIT_AUTHOR_EMAIL")
                .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
            verify_commands: get("VERIFY_COMMANDS")
                .map(|raw| parse_verify_commands(&raw))
                .unwrap_or_default(),
            work_root,
            openhands_command: get("OPENHANDS_COMMAND"),
            openhands_timeout,
            llm: LlmSettings {
                llm_model: get("LLM_MODEL"),
                openai_model: get("OPENAI_MODEL"),
                openai_api_key: get("OPENAI_API_KEY").map(Secret::new),
                google_api_key: get("GOOGLE_API_KEY").map(Secret::new),
                gemini_api_key: get("GEMINI_API_KEY").map(Secret::new),
                passthrough,
            },
            pr_template_path: get("PR_TEMPLATE_PATH").map(PathBuf::from),
            listen_host: get("LISTEN_HOST").unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string()),
            listen_port,
            skip_startup_validation: get("SKIP_STARTUP_VALIDATION")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        })
    }

    /// Base branch to use when an event does not supply one.
    pub fn base_branch_or_default(&self) -> &str {
        self.default_base_branch
            .as_deref()
            .unwrap_or(DEFAULT_BASE_BRANCH)
    }
}

/// Splits `VERIFY_COMMANDS` into individual commands.
///
/// One command per line; blank lines and `#` comments are skipped.
pub fn parse_verify_commands(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// `/work` inside containers and CI, `./work` otherwise.
fn default_work_root(is_ci: bool) -> PathBuf {
    if is_ci || Path::new("/.dockerenv").exists() {
        return PathBuf::from("/work");
    }
    PathBuf::from("work")
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            reason: "must be at least 1".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
