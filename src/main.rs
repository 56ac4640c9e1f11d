use std::sync::Arc;

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engineer_bot::config::Config;
use engineer_bot::engine::{EngineerLoop, Verifier};
use engineer_bot::git::{CommitIdentity, GitAuth, GitOps};
use engineer_bot::github::OctocrabClient;
use engineer_bot::persistence::{StateStore, WorkPaths};
use engineer_bot::preflight::{MISSING_TOKEN_MESSAGE, StartupProbes, validate_startup};
use engineer_bot::process::{CommandRunner, SystemCommandRunner};
use engineer_bot::provider::{NoopProvider, OpenHandsConfig, OpenHandsProvider, Provider};
use engineer_bot::server::{AppState, EventDefaults, build_router};
use engineer_bot::status::PrBodyRenderer;
use engineer_bot::worker::WorkerRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engineer_bot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());

    let github = config
        .token
        .as_ref()
        .map(|token| OctocrabClient::from_token(token, &config.api_base_url))
        .transpose()
        .context("failed to build GitHub client")?;

    let git = Arc::new(GitOps::new(
        runner.clone(),
        CommitIdentity {
            name: config.git_author_name.clone(),
            email: config.git_author_email.clone(),
        },
        config.token.as_ref().map(GitAuth::from_token),
    ));

    if config.skip_startup_validation {
        warn!("startup validation skipped");
    } else {
        validate_startup(
            &config,
            StartupProbes {
                github: github.as_ref(),
                git: Arc::clone(&git),
                runner: runner.as_ref(),
            },
        )
        .await?;
    }

    let Some(github) = github else {
        bail!(MISSING_TOKEN_MESSAGE);
    };

    let store = StateStore::new(WorkPaths::new(&config.work_root));
    store
        .ensure_directories()
        .context("failed to create work directories")?;

    let provider: Arc<dyn Provider> =
        match OpenHandsConfig::from_config(&config, store.paths().agent_home_dir.clone()) {
            Some(openhands) => Arc::new(
                OpenHandsProvider::new(openhands, runner.clone())
                    .context("invalid OPENHANDS_COMMAND")?,
            ),
            None => {
                warn!("OPENHANDS_COMMAND not set, every run will fail");
                Arc::new(NoopProvider::not_configured())
            }
        };

    let renderer = PrBodyRenderer::from_optional_file(config.pr_template_path.as_deref())
        .context("failed to load PR template")?;
    let verifier = Verifier::new(runner.clone(), config.verify_commands.clone());

    let engine = EngineerLoop::new(github, git, provider, store.clone(), renderer, verifier);
    let runtime = Arc::new(WorkerRuntime::new(engine));
    runtime.start()?;

    let defaults = EventDefaults {
        repo: config.default_repo.clone(),
        issue_number: config.default_issue,
        base_branch: config.default_base_branch.clone(),
    };
    let app = build_router(AppState::new(runtime.clone(), store, defaults));

    let addr = format!("{}:{}", config.listen_host, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, work_root = %config.work_root.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(runtime.cancellation_token()))
        .await
        .context("server error")?;

    runtime.stop().await;
    info!("shut down");
    Ok(())
}

/// Resolves on `/stop` or Ctrl-C; Ctrl-C also cancels the worker.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("interrupt received");
                token.cancel();
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl-C");
                token.cancelled().await;
            }
        },
    }
}
