//! Route definitions for the billing engine API

mod loan;
mod payment;

pub use loan::loan_routes;
pub use payment::payment_routes;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::middleware;
use crate::repository::UnitOfWork;
use crate::state::AppState;

/// Every billing route plus `/health`, with request tracing applied
pub fn app_router<U: UnitOfWork>(state: AppState<U>) -> Router {
    Router::new()
        .route("/health", get(health_check::<U>))
        .merge(loan_routes())
        .merge(payment_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
