//! Persistence contracts for loans and installments
//!
//! Repositories come in two flavours: autocommit handles obtained straight
//! from a [`UnitOfWork`], and handles bound to an open transaction obtained
//! by passing the transaction to `tx_loans` / `tx_installments`. The
//! transaction value is owned by the caller and must be handed back to
//! exactly one of `commit` or `rollback`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::loan::{Installment, Loan};

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, Hold, MemoryUnitOfWork};
pub use postgres::PgUnitOfWork;

/// Persistence failure
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == "23505")
            .unwrap_or(false);

        if unique_violation {
            RepositoryError::Conflict(err.to_string())
        } else {
            RepositoryError::Database(err)
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait LoanRepository: Send {
    async fn create_loan(&mut self, loan: &Loan) -> RepositoryResult<()>;

    async fn get_active_loans_by_borrower(&mut self, borrower_id: &str)
        -> RepositoryResult<Vec<Loan>>;

    /// Whether the borrower has a loan that was paid off
    async fn has_settled_loan(&mut self, borrower_id: &str) -> RepositoryResult<bool>;

    /// Fails with `NotFound` when no loan has the given id
    async fn set_loan_active(&mut self, loan_id: Uuid, active: bool) -> RepositoryResult<()>;
}

#[async_trait]
pub trait InstallmentRepository: Send {
    async fn create_installments(&mut self, installments: &[Installment]) -> RepositoryResult<()>;

    /// Stamps an unpaid installment. Fails with `Conflict` when the
    /// installment is already paid and `NotFound` when it does not exist.
    async fn set_installment_paid(
        &mut self,
        installment_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// Installments of a loan ordered by window start ascending
    async fn get_installments_by_loan(&mut self, loan_id: Uuid)
        -> RepositoryResult<Vec<Installment>>;
}

/// Transaction coordinator handing out autocommit and transaction-bound
/// repositories.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> RepositoryResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> RepositoryResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> RepositoryResult<()>;

    /// Cheap round trip proving the store is reachable
    async fn ping(&self) -> RepositoryResult<()>;

    fn loans(&self) -> Box<dyn LoanRepository + '_>;

    fn installments(&self) -> Box<dyn InstallmentRepository + '_>;

    fn tx_loans<'t>(&'t self, tx: &'t mut Self::Tx) -> Box<dyn LoanRepository + 't>;

    fn tx_installments<'t>(&'t self, tx: &'t mut Self::Tx)
        -> Box<dyn InstallmentRepository + 't>;
}
