//! Payment handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use validator::Validate;

use super::request_token;
use crate::error::{ApiError, ApiResult};
use crate::loan::PaymentReceipt;
use crate::models::{ApiResponse, BorrowerRequest};
use crate::repository::UnitOfWork;
use crate::state::AppState;

/// POST /payment - Pay the borrower's earliest eligible installment
pub async fn make_payment<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    payload: Result<Json<BorrowerRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<PaymentReceipt>>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.validate()?;

    let (cancel, _guard) = request_token(state.request_timeout);
    let receipt = state
        .payment_service
        .make_payment(&request.user_id, &cancel)
        .await?;

    Ok(Json(ApiResponse::ok(receipt)))
}
