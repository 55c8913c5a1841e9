//! Delinquency evaluation
//!
//! A borrower is delinquent once the due date of the relevant unpaid
//! installment plus the grace period lies strictly in the past. Which
//! installment is "relevant" depends on the configured [`DelinquencyRule`].

use chrono::{DateTime, Duration, Utc};

use super::model::Installment;
use super::product::DelinquencyRule;

/// Evaluate delinquency for a schedule ordered by window start ascending.
pub fn is_delinquent(
    installments: &[Installment],
    now: DateTime<Utc>,
    grace: Duration,
    rule: DelinquencyRule,
) -> bool {
    let relevant = match rule {
        DelinquencyRule::EarliestUnpaid => earliest_unpaid(installments),
        DelinquencyRule::PaidPivot => paid_pivot(installments),
    };

    match relevant {
        Some(installment) => now > installment.window_end + grace,
        None => false,
    }
}

fn earliest_unpaid(installments: &[Installment]) -> Option<&Installment> {
    installments.iter().find(|installment| !installment.is_paid())
}

/// Legacy selection: pivot on the first paid installment (or index 0 when
/// none is paid), then step one past it unless that would reach the final
/// installment.
fn paid_pivot(installments: &[Installment]) -> Option<&Installment> {
    if installments.is_empty() {
        return None;
    }

    let pivot = installments
        .iter()
        .position(Installment::is_paid)
        .unwrap_or(0);

    let index = if installments.len() - 1 > pivot + 1 {
        pivot + 1
    } else {
        pivot
    };

    installments.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Weekly schedule whose first window ended `first_end_days_ago` days before now
    fn schedule(len: usize, first_end_days_ago: i64) -> Vec<Installment> {
        let loan_id = Uuid::new_v4();
        let first_end = now() - Duration::days(first_end_days_ago);
        (0..len as i64)
            .map(|i| {
                let window_end = first_end + Duration::weeks(i);
                Installment {
                    id: Uuid::new_v4(),
                    loan_id,
                    amount: 100,
                    window_start: window_end - Duration::weeks(1) + Duration::microseconds(1),
                    window_end,
                    paid_at: None,
                }
            })
            .collect()
    }

    const GRACE: i64 = 14;

    #[test]
    fn test_earliest_unpaid_past_grace_is_delinquent() {
        let installments = schedule(50, 16);
        assert!(is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::EarliestUnpaid
        ));
    }

    #[test]
    fn test_earliest_unpaid_within_grace_is_not_delinquent() {
        let installments = schedule(50, 10);
        assert!(!is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::EarliestUnpaid
        ));
    }

    #[test]
    fn test_grace_boundary_is_exclusive() {
        let installments = schedule(50, GRACE);
        assert!(!is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::EarliestUnpaid
        ));
    }

    #[test]
    fn test_paid_installments_are_skipped() {
        let mut installments = schedule(50, 16);
        installments[0].paid_at = Some(now());
        // second window ended 9 days ago
        assert!(!is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::EarliestUnpaid
        ));
    }

    #[test]
    fn test_fully_paid_schedule_is_not_delinquent() {
        let mut installments = schedule(3, 100);
        for installment in installments.iter_mut() {
            installment.paid_at = Some(now());
        }
        assert!(!is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::EarliestUnpaid
        ));
    }

    #[test]
    fn test_empty_schedule_is_not_delinquent() {
        for rule in [DelinquencyRule::EarliestUnpaid, DelinquencyRule::PaidPivot] {
            assert!(!is_delinquent(&[], now(), Duration::days(GRACE), rule));
        }
    }

    #[test]
    fn test_paid_pivot_without_payments_checks_second_installment() {
        // first window ended 16 days ago, second 9 days ago
        let installments = schedule(50, 16);
        assert!(!is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::PaidPivot
        ));

        // first ended 30 days ago, second 23 days ago
        let installments = schedule(50, 30);
        assert!(is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::PaidPivot
        ));
    }

    #[test]
    fn test_paid_pivot_uses_first_paid_not_last() {
        // windows end 40, 33, 26, 19, ... days ago
        let mut installments = schedule(50, 40);
        installments[2].paid_at = Some(now());
        installments[3].paid_at = Some(now());
        // pivot = 2, checked = 3 (ended 19 days ago, paid but still checked)
        assert!(is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::PaidPivot
        ));

        installments[0].paid_at = Some(now());
        // pivot = 0, checked = 1 (ended 33 days ago)
        assert!(is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::PaidPivot
        ));
    }

    #[test]
    fn test_paid_pivot_short_schedule_keeps_pivot() {
        // len 2: len - 1 > pivot + 1 never holds, so the pivot itself is checked
        let installments = schedule(2, 16);
        assert!(is_delinquent(
            &installments,
            now(),
            Duration::days(GRACE),
            DelinquencyRule::PaidPivot
        ));
    }
}
