//! Liveness of the service and its loan store

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::repository::UnitOfWork;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub version: &'static str,
}

/// GET /health - 200 when the loan store answers, 503 otherwise
pub async fn health_check<U: UnitOfWork>(
    State(state): State<AppState<U>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.uow.ping().await {
        Ok(()) => (StatusCode::OK, "connected".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Loan store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, format!("error: {}", e))
        }
    };

    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    };
    (status, Json(body))
}
