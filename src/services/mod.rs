//! Loan and payment workflows

pub mod error;
pub mod loan_service;
pub mod payment_service;

pub use error::{LoanError, LoanResult};
pub use loan_service::LoanService;
pub use payment_service::PaymentService;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::loan::Loan;
use crate::repository::{RepositoryResult, UnitOfWork};

/// Run a persistence call unless the caller cancels first
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> LoanResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoanError::Cancelled),
        result = call => result.map_err(LoanError::from),
    }
}

/// Commit the transaction when `outcome` succeeded and the caller is still
/// waiting, otherwise roll it back and return the original failure.
pub(crate) async fn finish<U: UnitOfWork>(
    uow: &U,
    tx: U::Tx,
    outcome: LoanResult<()>,
    cancel: &CancellationToken,
) -> LoanResult<()> {
    let err = match outcome {
        Ok(()) if !cancel.is_cancelled() => return uow.commit(tx).await.map_err(LoanError::from),
        Ok(()) => LoanError::Cancelled,
        Err(err) => err,
    };

    if let Err(rollback_err) = uow.rollback(tx).await {
        tracing::error!(
            error = %rollback_err,
            cause = %err,
            "Transaction rollback failed"
        );
    }

    Err(err)
}

/// The borrower's active loan, or `NoActiveLoan`
pub(crate) async fn find_active_loan<U: UnitOfWork>(
    uow: &U,
    borrower_id: &str,
    cancel: &CancellationToken,
) -> LoanResult<Loan> {
    let mut loans = guarded(cancel, uow.loans().get_active_loans_by_borrower(borrower_id)).await?;

    if loans.len() > 1 {
        tracing::warn!(
            borrower_id = %borrower_id,
            active_loans = loans.len(),
            "Borrower has more than one active loan, using the oldest"
        );
    }

    if loans.is_empty() {
        return Err(LoanError::NoActiveLoan);
    }

    Ok(loans.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FailPoint, MemoryUnitOfWork, RepositoryError};
    use chrono::Utc;

    #[tokio::test]
    async fn test_cancel_before_commit_rolls_back() {
        let uow = MemoryUnitOfWork::new();
        let cancel = CancellationToken::new();

        let mut tx = uow.begin().await.unwrap();
        let loan = Loan::new("b1", 5_000_000, 500_000, Utc::now());
        uow.tx_loans(&mut tx).create_loan(&loan).await.unwrap();

        cancel.cancel();
        let err = finish(&uow, tx, Ok(()), &cancel).await.unwrap_err();

        assert!(matches!(err, LoanError::Cancelled));
        assert_eq!(uow.rollback_count(), 1);
        assert_eq!(uow.commit_count(), 0);
        assert!(uow.snapshot().loans.is_empty());
    }

    #[tokio::test]
    async fn test_finish_commits_successful_outcome() {
        let uow = MemoryUnitOfWork::new();
        let cancel = CancellationToken::new();

        let mut tx = uow.begin().await.unwrap();
        let loan = Loan::new("b1", 5_000_000, 500_000, Utc::now());
        uow.tx_loans(&mut tx).create_loan(&loan).await.unwrap();

        finish(&uow, tx, Ok(()), &cancel).await.unwrap();
        assert_eq!(uow.commit_count(), 1);
        assert_eq!(uow.rollback_count(), 0);
        assert_eq!(uow.snapshot().loans, vec![loan]);
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_original_error() {
        let uow = MemoryUnitOfWork::new();
        let cancel = CancellationToken::new();
        uow.fail_on(FailPoint::Rollback);

        let tx = uow.begin().await.unwrap();
        let err = finish(&uow, tx, Err(LoanError::NothingToPay), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, LoanError::NothingToPay));
        assert_eq!(uow.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_guarded_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = guarded(&cancel, async { Ok::<_, RepositoryError>(7) }).await;
        assert!(matches!(result, Err(LoanError::Cancelled)));
    }
}
