//! Workflow error taxonomy

use thiserror::Error;

use crate::repository::RepositoryError;

/// Failure of a loan or payment workflow
#[derive(Error, Debug)]
pub enum LoanError {
    #[error("borrower already has an active loan")]
    DuplicateActiveLoan,

    #[error("active loan not found")]
    NoActiveLoan,

    #[error("all installments have been paid off")]
    NothingToPay,

    #[error("concurrent update rejected: {0}")]
    Conflict(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("infrastructure failure: {0}")]
    Infrastructure(#[source] RepositoryError),
}

impl LoanError {
    /// Caller mistakes that leave no trace in storage
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LoanError::DuplicateActiveLoan | LoanError::NoActiveLoan | LoanError::NothingToPay
        )
    }
}

impl From<RepositoryError> for LoanError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => LoanError::Conflict(msg),
            other => LoanError::Infrastructure(other),
        }
    }
}

pub type LoanResult<T> = Result<T, LoanError>;
