//! API handlers for the billing engine

mod health;
mod loan;
mod payment;

pub use health::{health_check, HealthResponse};
pub use loan::{create_loan, get_outstanding, is_delinquent};
pub use payment::make_payment;

use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};

/// Token for one request's workflow.
///
/// Fires once `timeout` elapses, or when the returned guard is dropped
/// because the client went away and axum dropped the handler future.
pub(crate) fn request_token(timeout: Duration) -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let deadline = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = deadline.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Request deadline exceeded");
                deadline.cancel();
            }
        }
    });

    let guard = token.clone().drop_guard();
    (token, guard)
}
