//! Billing Engine Server
//!
//! Serves loan origination, balance, delinquency and payment endpoints on
//! top of PostgreSQL.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use billing_engine::config::Config;
use billing_engine::repository::PgUnitOfWork;
use billing_engine::state::AppState;
use billing_engine::routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        principal = config.product.principal,
        interest_rate_bps = config.product.interest_rate_bps,
        installments = config.product.installment_count,
        delinquency_rule = config.product.delinquency_rule.as_str(),
        "Starting billing engine"
    );

    tracing::info!(database = %config.database_url_masked(), "Connecting to loan store");
    let uow = PgUnitOfWork::connect(&config.database_url, config.db_max_connections).await?;
    uow.migrate().await?;

    let state = AppState::new(
        Arc::new(uow),
        config.product.clone(),
        Arc::new(SafeTimeProvider::new(TimeSource::System)),
        config.request_timeout,
    );

    let app = routes::app_router(state).layer(configure_cors(
            config.cors_allowed_origins.as_deref(),
            config.environment.is_production(),
        ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>, production: bool) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.trim().is_empty() {
        if production {
            tracing::warn!("CORS_ALLOWED_ORIGINS not set in production, denying cross-origin requests");
            return CorsLayer::new();
        }
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
