//! Loan origination and status handlers

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::request_token;
use crate::error::{ApiError, ApiResult};
use crate::loan::{Delinquency, Loan, Outstanding};
use crate::models::{ApiResponse, BorrowerQuery, BorrowerRequest};
use crate::repository::UnitOfWork;
use crate::state::AppState;

/// POST /loan - Originate a loan for a borrower
pub async fn create_loan<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    payload: Result<Json<BorrowerRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Loan>>)> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.validate()?;

    let (cancel, _guard) = request_token(state.request_timeout);
    let loan = state
        .loan_service
        .create_loan(&request.user_id, &cancel)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(loan))))
}

/// GET /loan/outstanding - Remaining balance on the active loan
pub async fn get_outstanding<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    query: Result<Query<BorrowerQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Outstanding>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    query.validate()?;

    let (cancel, _guard) = request_token(state.request_timeout);
    let outstanding = state
        .loan_service
        .get_outstanding(&query.user_id, &cancel)
        .await?;

    Ok(Json(ApiResponse::ok(outstanding)))
}

/// GET /loan/is-delinquent - Whether the borrower is past the grace period
pub async fn is_delinquent<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    query: Result<Query<BorrowerQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Delinquency>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    query.validate()?;

    let (cancel, _guard) = request_token(state.request_timeout);
    let delinquency = state
        .loan_service
        .is_delinquent(&query.user_id, &cancel)
        .await?;

    Ok(Json(ApiResponse::ok(delinquency)))
}
