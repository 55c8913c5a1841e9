//! Payment route definitions

use axum::{routing::post, Router};

use crate::handlers::make_payment;
use crate::repository::UnitOfWork;
use crate::state::AppState;

pub fn payment_routes<U: UnitOfWork>() -> Router<AppState<U>> {
    Router::new().route("/payment", post(make_payment::<U>))
}
