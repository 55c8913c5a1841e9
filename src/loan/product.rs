//! The fixed-term loan product offered to every borrower

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest schedule, and longest grace period, a product may span
pub const MAX_SCHEDULE_DAYS: i64 = 100 * 366;

/// Rejected product parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("principal must be greater than 0, got {0}")]
    NonPositivePrincipal(i64),

    #[error("interest rate must not be negative, got {0} bps")]
    NegativeRate(i64),

    #[error("installment count must be greater than 0")]
    NoInstallments,

    #[error("installment period must be at least one day, got {0}")]
    NonPositivePeriod(i64),

    #[error("grace period must not be negative, got {0}")]
    NegativeGrace(i64),

    #[error("principal {principal} at {rate_bps} bps does not fit in a 64-bit amount")]
    AmountOverflow { principal: i64, rate_bps: i64 },

    #[error("schedule must span at most {} days", MAX_SCHEDULE_DAYS)]
    ScheduleTooLong,

    #[error("grace period must be at most {} days, got {}", MAX_SCHEDULE_DAYS, .0)]
    GraceTooLong(i64),

    #[error("unknown delinquency rule: '{0}'. Expected: earliest-unpaid or paid-pivot")]
    UnknownRule(String),
}

/// Which installment decides whether a borrower is delinquent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelinquencyRule {
    /// The earliest unpaid installment in schedule order
    #[default]
    EarliestUnpaid,
    /// Legacy engine indexing: the installment after the first paid one
    PaidPivot,
}

impl DelinquencyRule {
    pub fn parse(s: &str) -> Result<Self, ProductError> {
        match s.trim().to_lowercase().as_str() {
            "earliest-unpaid" | "earliest_unpaid" => Ok(DelinquencyRule::EarliestUnpaid),
            "paid-pivot" | "paid_pivot" | "legacy" => Ok(DelinquencyRule::PaidPivot),
            other => Err(ProductError::UnknownRule(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DelinquencyRule::EarliestUnpaid => "earliest-unpaid",
            DelinquencyRule::PaidPivot => "paid-pivot",
        }
    }
}

/// Immutable loan product parameters shared by origination, scheduling
/// and delinquency evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanProduct {
    /// Amount lent, in minor units
    pub principal: i64,
    /// Flat one-time interest charge, in basis points of principal
    pub interest_rate_bps: i64,
    pub installment_count: u32,
    pub period_days: i64,
    pub grace_period_days: i64,
    pub delinquency_rule: DelinquencyRule,
}

impl Default for LoanProduct {
    fn default() -> Self {
        Self {
            principal: 5_000_000,
            interest_rate_bps: 1_000,
            installment_count: 50,
            period_days: 7,
            grace_period_days: 14,
            delinquency_rule: DelinquencyRule::EarliestUnpaid,
        }
    }
}

impl LoanProduct {
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.principal <= 0 {
            return Err(ProductError::NonPositivePrincipal(self.principal));
        }
        if self.interest_rate_bps < 0 {
            return Err(ProductError::NegativeRate(self.interest_rate_bps));
        }
        if self.installment_count == 0 {
            return Err(ProductError::NoInstallments);
        }
        if self.period_days <= 0 {
            return Err(ProductError::NonPositivePeriod(self.period_days));
        }
        if self.grace_period_days < 0 {
            return Err(ProductError::NegativeGrace(self.grace_period_days));
        }
        if self.grace_period_days > MAX_SCHEDULE_DAYS {
            return Err(ProductError::GraceTooLong(self.grace_period_days));
        }

        let span = self
            .period_days
            .checked_mul(i64::from(self.installment_count))
            .filter(|days| *days <= MAX_SCHEDULE_DAYS);
        if span.is_none() {
            return Err(ProductError::ScheduleTooLong);
        }

        let total = self
            .checked_interest()
            .and_then(|interest| self.principal.checked_add(interest));
        if total.is_none() {
            return Err(ProductError::AmountOverflow {
                principal: self.principal,
                rate_bps: self.interest_rate_bps,
            });
        }

        Ok(())
    }

    fn checked_interest(&self) -> Option<i64> {
        self.principal
            .checked_mul(self.interest_rate_bps)
            .map(|scaled| scaled / 10_000)
    }

    /// Flat interest charged once at origination.
    ///
    /// Saturates for products that fail [`LoanProduct::validate`].
    pub fn interest(&self) -> i64 {
        self.checked_interest().unwrap_or(i64::MAX)
    }

    pub fn total_due(&self) -> i64 {
        self.principal.saturating_add(self.interest())
    }

    /// Uniform installment amount before the final installment's remainder
    pub fn installment_amount(&self) -> i64 {
        let n = i64::from(self.installment_count);
        self.principal / n + self.interest() / n
    }

    pub fn period(&self) -> Duration {
        Duration::days(self.period_days)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::days(self.grace_period_days)
    }
}
