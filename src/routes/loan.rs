//! Loan route definitions

use axum::{routing::get, routing::post, Router};

use crate::handlers::{create_loan, get_outstanding, is_delinquent};
use crate::repository::UnitOfWork;
use crate::state::AppState;

pub fn loan_routes<U: UnitOfWork>() -> Router<AppState<U>> {
    Router::new()
        .route("/loan", post(create_loan::<U>))
        .route("/loan/outstanding", get(get_outstanding::<U>))
        .route("/loan/is-delinquent", get(is_delinquent::<U>))
}
