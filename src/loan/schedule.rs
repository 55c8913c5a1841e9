//! Installment schedule generation

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::model::Installment;
use super::product::LoanProduct;

/// Build the full installment plan for a newly originated loan.
///
/// Windows are consecutive periods starting at `originated_at`; each window
/// ends one microsecond before the next one opens. Every installment carries
/// the uniform amount except the last, which absorbs the division remainder
/// so the plan sums to exactly principal + interest.
///
/// `product` must have passed [`LoanProduct::validate`], which bounds the
/// schedule span and the amounts.
pub fn generate_schedule(
    loan_id: Uuid,
    originated_at: DateTime<Utc>,
    product: &LoanProduct,
) -> Vec<Installment> {
    let count = product.installment_count as usize;
    let amount = product.installment_amount();
    let remainder = product.total_due() - amount * i64::from(product.installment_count);
    let period = product.period();

    (0..count)
        .map(|i| {
            let window_start = originated_at + Duration::days(product.period_days * i as i64);
            let window_end = window_start + period - Duration::microseconds(1);
            let amount = if i + 1 == count {
                amount + remainder
            } else {
                amount
            };

            Installment {
                id: Uuid::new_v4(),
                loan_id,
                amount,
                window_start,
                window_end,
                paid_at: None,
            }
        })
        .collect()
}
