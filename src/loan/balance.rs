//! Outstanding balance calculation

use super::model::{Installment, Loan};

/// Principal plus interest, less every installment that has been paid.
///
/// The caller guarantees `installments` belong to `loan`.
pub fn outstanding_balance(loan: &Loan, installments: &[Installment]) -> i64 {
    let paid: i64 = installments
        .iter()
        .filter(|installment| installment.is_paid())
        .map(|installment| installment.amount)
        .sum();

    loan.total_due() - paid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::product::LoanProduct;
    use crate::loan::schedule::generate_schedule;
    use chrono::{TimeZone, Utc};

    fn fixture() -> (Loan, Vec<Installment>) {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let product = LoanProduct::default();
        let loan = Loan::new("borrower-1", product.principal, product.interest(), now);
        let schedule = generate_schedule(loan.id, now, &product);
        (loan, schedule)
    }

    #[test]
    fn test_nothing_paid_owes_everything() {
        let (loan, schedule) = fixture();
        assert_eq!(outstanding_balance(&loan, &schedule), 5_500_000);
    }

    #[test]
    fn test_paid_installments_reduce_balance() {
        let (loan, mut schedule) = fixture();
        let paid_at = loan.created_at;
        schedule[0].paid_at = Some(paid_at);
        schedule[1].paid_at = Some(paid_at);

        assert_eq!(outstanding_balance(&loan, &schedule), 5_500_000 - 2 * 110_000);
    }

    #[test]
    fn test_fully_paid_loan_owes_nothing() {
        let (loan, mut schedule) = fixture();
        for installment in schedule.iter_mut() {
            installment.paid_at = Some(loan.created_at);
        }

        assert_eq!(outstanding_balance(&loan, &schedule), 0);
    }

    #[test]
    fn test_empty_schedule_owes_total() {
        let (loan, _) = fixture();
        assert_eq!(outstanding_balance(&loan, &[]), loan.total_due());
    }
}
