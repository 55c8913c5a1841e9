//! Application state shared across handlers

use std::sync::Arc;
use std::time::Duration;

use hourglass_rs::SafeTimeProvider;

use crate::loan::LoanProduct;
use crate::repository::UnitOfWork;
use crate::services::{LoanService, PaymentService};

/// Shared application state
pub struct AppState<U> {
    pub uow: Arc<U>,
    pub loan_service: Arc<LoanService<U>>,
    pub payment_service: Arc<PaymentService<U>>,
    pub request_timeout: Duration,
}

impl<U: UnitOfWork> AppState<U> {
    /// Wire both workflows onto one unit of work
    pub fn new(
        uow: Arc<U>,
        product: LoanProduct,
        time: Arc<SafeTimeProvider>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            loan_service: Arc::new(LoanService::new(uow.clone(), product, time.clone())),
            payment_service: Arc::new(PaymentService::new(uow.clone(), time)),
            uow,
            request_timeout,
        }
    }
}

// manual impl: U itself need not be Clone
impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            uow: self.uow.clone(),
            loan_service: self.loan_service.clone(),
            payment_service: self.payment_service.clone(),
            request_timeout: self.request_timeout,
        }
    }
}
