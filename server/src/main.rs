//! RSVP reservation ledger HTTP server.

use anyhow::Context;
use axum::{Router, http::StatusCode, routing::get};
use rsvp_core::environment::SystemClock;
use rsvp_postgres::PostgresStore;
use rsvp_runtime::metrics::MetricsRecorder;
use rsvp_runtime::sample_subjects;
use rsvp_server::Config;
use rsvp_web::{AppState, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rsvp=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RSVP server");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        address = %config.server_addr(),
        metrics = %config.metrics_addr(),
        max_connections = config.database.max_connections,
        "Configuration loaded"
    );

    let pool = rsvp_postgres::connect(&config.database.url, &config.pool_settings())
        .await
        .context("failed to connect to PostgreSQL")?;
    let store = PostgresStore::new(pool).with_lock_timeout(config.database.lock_timeout);

    if config.run_migrations {
        store.migrate().await.context("failed to run migrations")?;
    }

    let state = AppState::new(store.clone(), Arc::new(SystemClock), config.retry_policy());

    if config.seed_sample_subjects {
        let added = state
            .catalog
            .seed_subjects(sample_subjects())
            .await
            .context("failed to seed sample users")?;
        info!(added, "Sample users seeded");
    }

    spawn_metrics_server(&config).await?;

    let app = build_router(state, config.rate_limit);
    let listener = tokio::net::TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr()))?;
    info!(address = %config.server_addr(), "Server listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
    let mut server_task = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server_task => {
            result.context("server task failed")?.context("server error")?;
        }
        () = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(config.server.shutdown_timeout, &mut server_task).await {
                Ok(result) => result.context("server task failed")?.context("server error")?,
                Err(_) => warn!(
                    timeout_secs = config.server.shutdown_timeout.as_secs(),
                    "In-flight requests did not finish before the shutdown timeout"
                ),
            }
        }
    }

    store.close().await;
    info!("Server stopped");
    Ok(())
}

/// Install the Prometheus recorder and serve `/metrics` on its own listener.
async fn spawn_metrics_server(config: &Config) -> anyhow::Result<()> {
    let mut recorder = MetricsRecorder::new();
    recorder.install().context("failed to install metrics recorder")?;
    let recorder = Arc::new(recorder);

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let recorder = Arc::clone(&recorder);
            async move { recorder.render().ok_or(StatusCode::SERVICE_UNAVAILABLE) }
        }),
    );

    let listener = tokio::net::TcpListener::bind(config.metrics_addr())
        .await
        .with_context(|| format!("failed to bind metrics address {}", config.metrics_addr()))?;
    info!(address = %config.metrics_addr(), "Metrics server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
