//! Loan models for the billing engine
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Loan lifecycle state, derived from the `active` flag
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    PendingPayments,
    Settled,
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Loan {
    pub id: Uuid,
    pub borrower_id: String,
    pub principal: i64, // minor units
    pub interest: i64,  // flat charge, fixed at origination
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// Build a fresh active loan for a borrower
    pub fn new(
        borrower_id: impl Into<String>,
        principal: i64,
        interest: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            borrower_id: borrower_id.into(),
            principal,
            interest,
            active: true,
            created_at,
            deleted_at: None,
        }
    }

    /// Principal plus the flat interest charge
    pub fn total_due(&self) -> i64 {
        self.principal + self.interest
    }

    pub fn status(&self) -> LoanStatus {
        if self.active {
            LoanStatus::PendingPayments
        } else {
            LoanStatus::Settled
        }
    }
}

/// Installment model (one scheduled repayment window)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Installment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    /// Whether the installment window has opened as of `now`
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.window_start <= now
    }
}

/// Outstanding balance of the active loan
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Outstanding {
    pub outstanding: i64,
}

/// Delinquency status of the active loan
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Delinquency {
    pub is_delinquent: bool,
}

/// Result of a successful payment
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub loan_id: Uuid,
    pub installment_id: Uuid,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
    pub loan_settled: bool,
}
