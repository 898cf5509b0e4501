//! # fileloader-api — Binary Entry Point
//!
//! Parses configuration, binds the listener, optionally switches to an
//! unprivileged user, prepares the storage root, and serves the HTTP API
//! until SIGINT or SIGTERM. In-flight requests finish before exit.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fileloader_api::config::{clear_env, AppConfig, LogFormat};
use fileloader_api::middleware::metrics::ApiMetrics;
use fileloader_api::process::{self, PidFile};
use fileloader_api::state::AppState;
use fileloader_store::BlobStore;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    // Environment mutation is only sound while the process is single-threaded.
    clear_env();
    init_tracing(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(config))
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.directive()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store_config = config.store_config()?;

    #[cfg(unix)]
    let run_as = config
        .user
        .as_deref()
        .map(process::resolve_user)
        .transpose()?;
    #[cfg(not(unix))]
    if config.user.is_some() {
        anyhow::bail!("--user is only supported on unix");
    }

    // Bind while still privileged, then give the privileges up.
    let listener = tokio::net::TcpListener::bind((config.api_address.as_str(), config.api_port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.api_address, config.api_port))?;
    #[cfg(unix)]
    if let Some(user) = &run_as {
        process::drop_privileges(user)?;
    }

    tokio::fs::create_dir_all(&store_config.root)
        .await
        .with_context(|| format!("failed to create storage root {}", store_config.root.display()))?;

    let metrics = ApiMetrics::new().context("failed to register metrics")?;
    let store = BlobStore::open_with_observer(store_config, Arc::new(metrics.clone()))?;
    tracing::info!(
        root = %store.config().root.display(),
        algorithm = %store.algorithm(),
        chunk_size = store.config().chunk_size,
        "blob store opened"
    );

    let pid_file = config
        .pid_file
        .as_deref()
        .map(PidFile::acquire)
        .transpose()?;

    let sweeper = config.sweep_interval().map(|interval| {
        tracing::info!(interval_secs = interval.as_secs(), "staging sweep enabled");
        tokio::spawn(store.clone().sweep_periodically(interval))
    });

    let app = fileloader_api::app(AppState::new(store, metrics));
    let served = serve(listener, app).await;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    if let Some(pid_file) = pid_file {
        pid_file.release();
    }

    served
}

async fn serve(listener: tokio::net::TcpListener, app: axum::Router) -> anyhow::Result<()> {
    tracing::info!("fileloader API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}
