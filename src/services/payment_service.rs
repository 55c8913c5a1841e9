//! Payment service layer - applies a payment to the earliest eligible installment

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tokio_util::sync::CancellationToken;

use super::{finish, find_active_loan, guarded, LoanError, LoanResult};
use crate::loan::{Installment, Loan, PaymentReceipt};
use crate::repository::UnitOfWork;

/// First installment in schedule order whose window has opened and which is
/// still unpaid.
pub fn eligible_installment(
    installments: &[Installment],
    now: DateTime<Utc>,
) -> Option<&Installment> {
    installments
        .iter()
        .find(|installment| installment.has_started(now) && !installment.is_paid())
}

/// Whether `installment` closes the schedule
pub fn is_final_installment(installments: &[Installment], installment: &Installment) -> bool {
    installments
        .last()
        .map(|last| last.id == installment.id)
        .unwrap_or(false)
}

/// Payment service for settling installments
pub struct PaymentService<U> {
    uow: Arc<U>,
    time: Arc<SafeTimeProvider>,
}

impl<U: UnitOfWork> PaymentService<U> {
    pub fn new(uow: Arc<U>, time: Arc<SafeTimeProvider>) -> Self {
        Self { uow, time }
    }

    /// Pay the borrower's earliest eligible installment, settling the loan
    /// when it was the last one.
    pub async fn make_payment(
        &self,
        borrower_id: &str,
        cancel: &CancellationToken,
    ) -> LoanResult<PaymentReceipt> {
        let loan = match find_active_loan(self.uow.as_ref(), borrower_id, cancel).await {
            Ok(loan) => loan,
            Err(LoanError::NoActiveLoan) => {
                // a paid-off loan leaves nothing to pay rather than no loan
                let settled =
                    guarded(cancel, self.uow.loans().has_settled_loan(borrower_id)).await?;
                return Err(if settled {
                    LoanError::NothingToPay
                } else {
                    LoanError::NoActiveLoan
                });
            }
            Err(err) => return Err(err),
        };
        let now = self.time.now();

        let installments = guarded(
            cancel,
            self.uow.installments().get_installments_by_loan(loan.id),
        )
        .await?;

        let eligible = eligible_installment(&installments, now).ok_or(LoanError::NothingToPay)?;
        let settles_loan = is_final_installment(&installments, eligible);

        let mut tx = guarded(cancel, self.uow.begin()).await?;
        let outcome = self
            .apply_payment(&mut tx, &loan, eligible, settles_loan, now, cancel)
            .await;
        finish(self.uow.as_ref(), tx, outcome, cancel).await?;

        tracing::info!(
            borrower_id = %borrower_id,
            loan_id = %loan.id,
            installment_id = %eligible.id,
            amount = eligible.amount,
            "Installment paid"
        );
        if settles_loan {
            tracing::info!(
                borrower_id = %borrower_id,
                loan_id = %loan.id,
                "Loan settled"
            );
        }

        Ok(PaymentReceipt {
            loan_id: loan.id,
            installment_id: eligible.id,
            amount: eligible.amount,
            paid_at: now,
            loan_settled: settles_loan,
        })
    }

    async fn apply_payment(
        &self,
        tx: &mut U::Tx,
        loan: &Loan,
        installment: &Installment,
        settles_loan: bool,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> LoanResult<()> {
        guarded(
            cancel,
            self.uow
                .tx_installments(tx)
                .set_installment_paid(installment.id, now),
        )
        .await?;

        if settles_loan {
            guarded(cancel, self.uow.tx_loans(tx).set_loan_active(loan.id, false)).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::{generate_schedule, LoanProduct};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn schedule() -> Vec<Installment> {
        generate_schedule(Uuid::new_v4(), origin(), &LoanProduct::default())
    }

    #[test]
    fn test_first_window_is_eligible_at_origination() {
        let installments = schedule();
        let eligible = eligible_installment(&installments, origin()).unwrap();
        assert_eq!(eligible.id, installments[0].id);
    }

    #[test]
    fn test_nothing_eligible_before_origination() {
        let installments = schedule();
        assert!(eligible_installment(&installments, origin() - Duration::seconds(1)).is_none());
    }

    #[test]
    fn test_earliest_unpaid_started_installment_wins() {
        let mut installments = schedule();
        installments[0].paid_at = Some(origin());
        let now = origin() + Duration::days(20); // windows 0..=2 have started

        let eligible = eligible_installment(&installments, now).unwrap();
        assert_eq!(eligible.id, installments[1].id);
    }

    #[test]
    fn test_future_windows_are_not_eligible() {
        let mut installments = schedule();
        installments[0].paid_at = Some(origin());
        assert!(eligible_installment(&installments, origin() + Duration::days(1)).is_none());
    }

    #[test]
    fn test_final_installment_detection() {
        let installments = schedule();
        assert!(is_final_installment(&installments, &installments[49]));
        assert!(!is_final_installment(&installments, &installments[48]));
        assert!(!is_final_installment(&[], &installments[0]));
    }
}
