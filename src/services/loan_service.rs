//! Loan service layer - origination, balance and delinquency queries

use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tokio_util::sync::CancellationToken;

use super::{finish, find_active_loan, guarded, LoanError, LoanResult};
use crate::loan::{
    generate_schedule, is_delinquent, outstanding_balance, Delinquency, Installment, Loan,
    LoanProduct, Outstanding,
};
use crate::repository::UnitOfWork;

/// Loan service for managing loan origination and status queries
pub struct LoanService<U> {
    uow: Arc<U>,
    product: LoanProduct,
    time: Arc<SafeTimeProvider>,
}

impl<U: UnitOfWork> LoanService<U> {
    /// Create a new loan service instance
    pub fn new(uow: Arc<U>, product: LoanProduct, time: Arc<SafeTimeProvider>) -> Self {
        Self { uow, product, time }
    }

    /// Originate a loan with its full installment schedule.
    ///
    /// Either the loan and every installment are committed together, or
    /// nothing is.
    pub async fn create_loan(
        &self,
        borrower_id: &str,
        cancel: &CancellationToken,
    ) -> LoanResult<Loan> {
        let existing =
            guarded(cancel, self.uow.loans().get_active_loans_by_borrower(borrower_id)).await?;
        if !existing.is_empty() {
            return Err(LoanError::DuplicateActiveLoan);
        }

        let now = self.time.now();
        let loan = Loan::new(
            borrower_id,
            self.product.principal,
            self.product.interest(),
            now,
        );
        let schedule = generate_schedule(loan.id, now, &self.product);

        let mut tx = guarded(cancel, self.uow.begin()).await?;
        let outcome = self.persist_loan(&mut tx, &loan, &schedule, cancel).await;

        // a lost race against another origination surfaces as a write conflict
        finish(self.uow.as_ref(), tx, outcome, cancel)
            .await
            .map_err(|err| match err {
                LoanError::Conflict(_) => LoanError::DuplicateActiveLoan,
                other => other,
            })?;

        tracing::info!(
            borrower_id = %borrower_id,
            loan_id = %loan.id,
            installments = schedule.len(),
            total_due = loan.total_due(),
            "Loan originated"
        );

        Ok(loan)
    }

    async fn persist_loan(
        &self,
        tx: &mut U::Tx,
        loan: &Loan,
        schedule: &[Installment],
        cancel: &CancellationToken,
    ) -> LoanResult<()> {
        // repeat the duplicate check inside the transaction
        let active = guarded(
            cancel,
            self.uow
                .tx_loans(tx)
                .get_active_loans_by_borrower(&loan.borrower_id),
        )
        .await?;
        if !active.is_empty() {
            return Err(LoanError::DuplicateActiveLoan);
        }

        guarded(cancel, self.uow.tx_loans(tx).create_loan(loan)).await?;
        guarded(
            cancel,
            self.uow.tx_installments(tx).create_installments(schedule),
        )
        .await?;

        Ok(())
    }

    /// Principal plus interest less every paid installment
    pub async fn get_outstanding(
        &self,
        borrower_id: &str,
        cancel: &CancellationToken,
    ) -> LoanResult<Outstanding> {
        let loan = find_active_loan(self.uow.as_ref(), borrower_id, cancel).await?;
        let installments = guarded(
            cancel,
            self.uow.installments().get_installments_by_loan(loan.id),
        )
        .await?;

        Ok(Outstanding {
            outstanding: outstanding_balance(&loan, &installments),
        })
    }

    /// Whether the borrower is past the grace period on their active loan
    pub async fn is_delinquent(
        &self,
        borrower_id: &str,
        cancel: &CancellationToken,
    ) -> LoanResult<Delinquency> {
        let loan = find_active_loan(self.uow.as_ref(), borrower_id, cancel).await?;
        let installments = guarded(
            cancel,
            self.uow.installments().get_installments_by_loan(loan.id),
        )
        .await?;

        let delinquent = is_delinquent(
            &installments,
            self.time.now(),
            self.product.grace_period(),
            self.product.delinquency_rule,
        );

        if delinquent {
            tracing::debug!(
                borrower_id = %borrower_id,
                loan_id = %loan.id,
                rule = self.product.delinquency_rule.as_str(),
                "Borrower is delinquent"
            );
        }

        Ok(Delinquency {
            is_delinquent: delinquent,
        })
    }
}
