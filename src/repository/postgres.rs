//! PostgreSQL repositories backed by sqlx

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{
    InstallmentRepository, LoanRepository, RepositoryError, RepositoryResult, UnitOfWork,
};
use crate::loan::{Installment, Loan};

/// Where a repository sends its queries
enum PgHandle<'c> {
    Pool(&'c PgPool),
    Conn(&'c mut PgConnection),
}

/// Loan repository over a pool or an open transaction
pub struct PgLoanRepository<'c> {
    handle: PgHandle<'c>,
}

/// Installment repository over a pool or an open transaction
pub struct PgInstallmentRepository<'c> {
    handle: PgHandle<'c>,
}

#[async_trait]
impl<'c> LoanRepository for PgLoanRepository<'c> {
    async fn create_loan(&mut self, loan: &Loan) -> RepositoryResult<()> {
        let query = sqlx::query(
            r#"
            INSERT INTO loans (id, borrower_id, principal, interest, active, created_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(loan.id)
        .bind(&loan.borrower_id)
        .bind(loan.principal)
        .bind(loan.interest)
        .bind(loan.active)
        .bind(loan.created_at)
        .bind(loan.deleted_at);

        let result = match &mut self.handle {
            PgHandle::Pool(pool) => query.execute(*pool).await,
            PgHandle::Conn(conn) => query.execute(&mut **conn).await,
        };
        result.map_err(RepositoryError::from_sqlx)?;

        Ok(())
    }

    async fn get_active_loans_by_borrower(
        &mut self,
        borrower_id: &str,
    ) -> RepositoryResult<Vec<Loan>> {
        let query = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, borrower_id, principal, interest, active, created_at, deleted_at
            FROM loans
            WHERE borrower_id = $1 AND active = TRUE AND deleted_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(borrower_id);

        let loans = match &mut self.handle {
            PgHandle::Pool(pool) => query.fetch_all(*pool).await,
            PgHandle::Conn(conn) => query.fetch_all(&mut **conn).await,
        }?;

        Ok(loans)
    }

    async fn has_settled_loan(&mut self, borrower_id: &str) -> RepositoryResult<bool> {
        let query = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM loans
                WHERE borrower_id = $1 AND active = FALSE AND deleted_at IS NULL
            )
            "#,
        )
        .bind(borrower_id);

        let settled = match &mut self.handle {
            PgHandle::Pool(pool) => query.fetch_one(*pool).await,
            PgHandle::Conn(conn) => query.fetch_one(&mut **conn).await,
        }?;

        Ok(settled)
    }

    async fn set_loan_active(&mut self, loan_id: Uuid, active: bool) -> RepositoryResult<()> {
        let query = sqlx::query("UPDATE loans SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(loan_id);

        let result = match &mut self.handle {
            PgHandle::Pool(pool) => query.execute(*pool).await,
            PgHandle::Conn(conn) => query.execute(&mut **conn).await,
        }
        .map_err(RepositoryError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("loan {}", loan_id)));
        }

        Ok(())
    }
}

#[async_trait]
impl<'c> InstallmentRepository for PgInstallmentRepository<'c> {
    async fn create_installments(&mut self, installments: &[Installment]) -> RepositoryResult<()> {
        if installments.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO installments (id, loan_id, amount, window_start, window_end, paid_at) ",
        );
        builder.push_values(installments, |mut row, installment| {
            row.push_bind(installment.id)
                .push_bind(installment.loan_id)
                .push_bind(installment.amount)
                .push_bind(installment.window_start)
                .push_bind(installment.window_end)
                .push_bind(installment.paid_at);
        });
        let query = builder.build();

        let result = match &mut self.handle {
            PgHandle::Pool(pool) => query.execute(*pool).await,
            PgHandle::Conn(conn) => query.execute(&mut **conn).await,
        };
        result.map_err(RepositoryError::from_sqlx)?;

        Ok(())
    }

    async fn set_installment_paid(
        &mut self,
        installment_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let query =
            sqlx::query("UPDATE installments SET paid_at = $1 WHERE id = $2 AND paid_at IS NULL")
                .bind(paid_at)
                .bind(installment_id);

        let result = match &mut self.handle {
            PgHandle::Pool(pool) => query.execute(*pool).await,
            PgHandle::Conn(conn) => query.execute(&mut **conn).await,
        }
        .map_err(RepositoryError::from_sqlx)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // nothing updated: tell a missing row apart from one already stamped
        let lookup = sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
            "SELECT paid_at FROM installments WHERE id = $1",
        )
        .bind(installment_id);

        let existing = match &mut self.handle {
            PgHandle::Pool(pool) => lookup.fetch_optional(*pool).await,
            PgHandle::Conn(conn) => lookup.fetch_optional(&mut **conn).await,
        }?;

        match existing {
            Some(_) => Err(RepositoryError::Conflict(format!(
                "installment {} is already paid",
                installment_id
            ))),
            None => Err(RepositoryError::NotFound(format!(
                "installment {}",
                installment_id
            ))),
        }
    }

    async fn get_installments_by_loan(
        &mut self,
        loan_id: Uuid,
    ) -> RepositoryResult<Vec<Installment>> {
        let query = sqlx::query_as::<_, Installment>(
            r#"
            SELECT id, loan_id, amount, window_start, window_end, paid_at
            FROM installments
            WHERE loan_id = $1
            ORDER BY window_start ASC
            "#,
        )
        .bind(loan_id);

        let installments = match &mut self.handle {
            PgHandle::Pool(pool) => query.fetch_all(*pool).await,
            PgHandle::Conn(conn) => query.fetch_all(&mut **conn).await,
        }?;

        Ok(installments)
    }
}

/// Unit of work over a PostgreSQL pool
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`. Connection failures surface as
    /// `Unavailable` so startup can report them without the driver noise.
    pub async fn connect(database_url: &str, max_connections: u32) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        tracing::info!(max_connections, "Loan store connection pool ready");
        Ok(Self::new(pool))
    }

    /// Bring the loans and installments schema up to date
    pub async fn migrate(&self) -> RepositoryResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Loan store schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> RepositoryResult<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> RepositoryResult<()> {
        tx.commit().await.map_err(RepositoryError::from_sqlx)
    }

    async fn rollback(&self, tx: Self::Tx) -> RepositoryResult<()> {
        Ok(tx.rollback().await?)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn loans(&self) -> Box<dyn LoanRepository + '_> {
        Box::new(PgLoanRepository {
            handle: PgHandle::Pool(&self.pool),
        })
    }

    fn installments(&self) -> Box<dyn InstallmentRepository + '_> {
        Box::new(PgInstallmentRepository {
            handle: PgHandle::Pool(&self.pool),
        })
    }

    fn tx_loans<'t>(&'t self, tx: &'t mut Self::Tx) -> Box<dyn LoanRepository + 't> {
        Box::new(PgLoanRepository {
            handle: PgHandle::Conn(&mut **tx),
        })
    }

    fn tx_installments<'t>(
        &'t self,
        tx: &'t mut Self::Tx,
    ) -> Box<dyn InstallmentRepository + 't> {
        Box::new(PgInstallmentRepository {
            handle: PgHandle::Conn(&mut **tx),
        })
    }
}
