use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aiyou_api::config::ServerConfig;
use aiyou_api::router::build_app_router;
use aiyou_api::state::{build_supervisor, AppState};
use aiyou_pipeline::PipelineConfig;
use aiyou_providers::ProviderRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aiyou_api=debug,aiyou_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let pipeline_config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = aiyou_db::create_pool(&config.database_url)
        .await
        .context("Failed to open database")?;
    aiyou_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    aiyou_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!(database_url = %config.database_url, "Database ready");

    // --- Providers ---
    let registry = ProviderRegistry::from_env(pipeline_config.provider_timeout)
        .context("Failed to configure providers")?;
    if registry.is_empty() {
        tracing::warn!("No provider API keys configured; generation requests will be rejected");
    }

    // --- Pipeline ---
    let supervisor = build_supervisor(pool, Arc::new(registry), &pipeline_config)
        .await
        .context("Failed to start generation pipeline")?;

    // --- Router ---
    let state = AppState::new(config.clone(), Arc::clone(&supervisor));
    let app = build_app_router(state, &config).context("Invalid router configuration")?;

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    // Resume after binding so the health route answers while providers
    // are being probed.
    let resume = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            match supervisor.resume_in_flight().await {
                Ok(report) => tracing::info!(?report, "Resumed in-flight groups"),
                Err(e) => tracing::error!(error = %e, "Failed to resume in-flight groups"),
            }
        })
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, suspending generations");
    resume.abort();
    supervisor.shutdown().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
