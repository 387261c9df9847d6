//! Process bootstrap shared by the demo binaries.

use anyhow::Context;
use axum::Router;
use tracing::info;
use webshim_core::AppConfig;
use webshim_tasks::{ExtensionClient, LocalSource, RunnerConfig, TaskQueue, TaskRunner, TaskRunnerHandle};

/// Read configuration and initialize logging. Call once at the top of `main`.
pub fn bootstrap() -> anyhow::Result<AppConfig> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    webshim_observability::init(config.log_format);
    info!(lambda = config.is_lambda(), addr = %config.listen_addr(), "configuration loaded");
    Ok(config)
}

/// Start the deferred-task runner.
///
/// Under Lambda the runner registers as an extension and follows the
/// platform's invocations; elsewhere every batch runs as soon as it is
/// marked done.
pub async fn start_task_runner(config: &AppConfig) -> anyhow::Result<(TaskQueue, TaskRunnerHandle)> {
    let runner_config = RunnerConfig::default().with_name(config.extension_name.clone());

    let started = match &config.runtime_api {
        Some(runtime_api) => {
            let client = ExtensionClient::register(runtime_api, &config.extension_name)
                .await
                .context("failed to register with the extensions api")?;
            TaskRunner::start(client, runner_config)
        }
        None => {
            info!("no lambda runtime api; deferred tasks run right after each response");
            TaskRunner::start(LocalSource, runner_config)
        }
    };

    started.context("failed to start deferred task worker")
}

/// Bind the configured address and serve `app` until SIGINT/SIGTERM.
pub async fn serve(config: &AppConfig, app: Router) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
