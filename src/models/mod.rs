//! Request and response shapes for the billing engine API

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request body naming the borrower an operation applies to
#[derive(Debug, Deserialize, Validate)]
pub struct BorrowerRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
}

/// Query string naming the borrower an operation applies to
#[derive(Debug, Deserialize, Validate)]
pub struct BorrowerQuery {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}
