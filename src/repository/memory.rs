//! In-process unit of work
//!
//! Keeps loans and installments in memory with the same constraints the
//! PostgreSQL schema enforces (unique ids, one active loan per borrower,
//! installments owned by an existing loan, paid stamps set once).
//! Transactions stage their writes on a private copy and replay them against
//! the shared state on commit, so a write that lost a race surfaces as a
//! `Conflict` at commit time. Individual operations can be made to fail with
//! [`MemoryUnitOfWork::fail_on`], or parked mid-workflow with
//! [`MemoryUnitOfWork::hold_next`] so two workflows can be interleaved.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use super::{
    InstallmentRepository, LoanRepository, RepositoryError, RepositoryResult, UnitOfWork,
};
use crate::loan::{Installment, Loan};

/// Operation that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    Commit,
    Rollback,
    CreateLoan,
    GetActiveLoans,
    HasSettledLoan,
    SetLoanActive,
    CreateInstallments,
    SetInstallmentPaid,
    GetInstallments,
    Ping,
}

/// A call parked by [`MemoryUnitOfWork::hold_next`]
#[derive(Debug, Clone)]
pub struct Hold {
    parked: Arc<Notify>,
    release: Arc<Notify>,
}

impl Hold {
    /// Resolves once the held call has arrived and is waiting
    pub async fn parked(&self) {
        self.parked.notified().await;
    }

    /// Let the held call continue
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Committed (or staged) records
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub loans: Vec<Loan>,
    pub installments: Vec<Installment>,
}

#[derive(Debug, Clone)]
enum Write {
    CreateLoan(Loan),
    CreateInstallments(Vec<Installment>),
    SetLoanActive(Uuid, bool),
    SetInstallmentPaid(Uuid, DateTime<Utc>),
}

impl StoreState {
    pub fn active_loans(&self, borrower_id: &str) -> Vec<Loan> {
        self.loans
            .iter()
            .filter(|l| l.borrower_id == borrower_id && l.active && l.deleted_at.is_none())
            .cloned()
            .collect()
    }

    pub fn installments_for(&self, loan_id: Uuid) -> Vec<Installment> {
        let mut installments: Vec<Installment> = self
            .installments
            .iter()
            .filter(|i| i.loan_id == loan_id)
            .cloned()
            .collect();
        installments.sort_by_key(|i| i.window_start);
        installments
    }

    fn apply(&mut self, write: &Write) -> RepositoryResult<()> {
        match write {
            Write::CreateLoan(loan) => {
                if self.loans.iter().any(|l| l.id == loan.id) {
                    return Err(RepositoryError::Conflict(format!("loan {} exists", loan.id)));
                }
                if loan.active && !self.active_loans(&loan.borrower_id).is_empty() {
                    return Err(RepositoryError::Conflict(format!(
                        "borrower {} already has an active loan",
                        loan.borrower_id
                    )));
                }
                self.loans.push(loan.clone());
            }
            Write::CreateInstallments(installments) => {
                for installment in installments {
                    if !self.loans.iter().any(|l| l.id == installment.loan_id) {
                        return Err(RepositoryError::NotFound(format!(
                            "loan {}",
                            installment.loan_id
                        )));
                    }
                    if self.installments.iter().any(|i| i.id == installment.id) {
                        return Err(RepositoryError::Conflict(format!(
                            "installment {} exists",
                            installment.id
                        )));
                    }
                }
                self.installments.extend(installments.iter().cloned());
            }
            Write::SetLoanActive(loan_id, active) => {
                let loan = self
                    .loans
                    .iter_mut()
                    .find(|l| l.id == *loan_id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("loan {}", loan_id)))?;
                loan.active = *active;
            }
            Write::SetInstallmentPaid(installment_id, paid_at) => {
                let installment = self
                    .installments
                    .iter_mut()
                    .find(|i| i.id == *installment_id)
                    .ok_or_else(|| {
                        RepositoryError::NotFound(format!("installment {}", installment_id))
                    })?;
                if installment.paid_at.is_some() {
                    return Err(RepositoryError::Conflict(format!(
                        "installment {} is already paid",
                        installment_id
                    )));
                }
                installment.paid_at = Some(*paid_at);
            }
        }
        Ok(())
    }
}

/// Open in-memory transaction
#[derive(Debug)]
pub struct MemoryTx {
    staged: StoreState,
    journal: Vec<Write>,
}

/// In-memory unit of work with fault injection and call counters
#[derive(Debug, Default)]
pub struct MemoryUnitOfWork {
    state: Mutex<StoreState>,
    faults: Mutex<HashSet<FailPoint>>,
    holds: Mutex<HashMap<FailPoint, Hold>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `point` fail with `Unavailable`
    pub fn fail_on(&self, point: FailPoint) {
        lock(&self.faults).insert(point);
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    /// Park the next call of `point` until the returned hold is released.
    /// Later calls of `point` pass straight through.
    pub fn hold_next(&self, point: FailPoint) -> Hold {
        let hold = Hold {
            parked: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        lock(&self.holds).insert(point, hold.clone());
        hold
    }

    /// Insert a loan and its installments directly, outside any transaction
    pub fn seed(&self, loan: Loan, installments: Vec<Installment>) -> RepositoryResult<()> {
        let mut state = lock(&self.state);
        let mut next = state.clone();
        next.apply(&Write::CreateLoan(loan))?;
        next.apply(&Write::CreateInstallments(installments))?;
        *state = next;
        Ok(())
    }

    /// Copy of the committed records
    pub fn snapshot(&self) -> StoreState {
        lock(&self.state).clone()
    }

    pub fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    async fn enter(&self, point: FailPoint) -> RepositoryResult<()> {
        let hold = lock(&self.holds).remove(&point);
        if let Some(hold) = hold {
            hold.parked.notify_one();
            hold.release.notified().await;
        }
        self.check(point)
    }

    fn check(&self, point: FailPoint) -> RepositoryResult<()> {
        if lock(&self.faults).contains(&point) {
            return Err(RepositoryError::Unavailable(format!(
                "injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Target<'a> {
    Shared(&'a Mutex<StoreState>),
    Staged(&'a mut MemoryTx),
}

impl Target<'_> {
    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        match self {
            Target::Shared(state) => f(&*lock(*state)),
            Target::Staged(tx) => f(&tx.staged),
        }
    }

    fn write(&mut self, write: Write) -> RepositoryResult<()> {
        match self {
            Target::Shared(state) => lock(*state).apply(&write),
            Target::Staged(tx) => {
                tx.staged.apply(&write)?;
                tx.journal.push(write);
                Ok(())
            }
        }
    }
}

/// Memory-backed repository for both loans and installments
pub struct MemoryRepository<'a> {
    uow: &'a MemoryUnitOfWork,
    target: Target<'a>,
}

#[async_trait]
impl<'a> LoanRepository for MemoryRepository<'a> {
    async fn create_loan(&mut self, loan: &Loan) -> RepositoryResult<()> {
        self.uow.enter(FailPoint::CreateLoan).await?;
        self.target.write(Write::CreateLoan(loan.clone()))
    }

    async fn get_active_loans_by_borrower(
        &mut self,
        borrower_id: &str,
    ) -> RepositoryResult<Vec<Loan>> {
        self.uow.enter(FailPoint::GetActiveLoans).await?;
        Ok(self.target.read(|state| state.active_loans(borrower_id)))
    }

    async fn has_settled_loan(&mut self, borrower_id: &str) -> RepositoryResult<bool> {
        self.uow.enter(FailPoint::HasSettledLoan).await?;
        Ok(self.target.read(|state| {
            state
                .loans
                .iter()
                .any(|l| l.borrower_id == borrower_id && !l.active && l.deleted_at.is_none())
        }))
    }

    async fn set_loan_active(&mut self, loan_id: Uuid, active: bool) -> RepositoryResult<()> {
        self.uow.enter(FailPoint::SetLoanActive).await?;
        self.target.write(Write::SetLoanActive(loan_id, active))
    }
}

#[async_trait]
impl<'a> InstallmentRepository for MemoryRepository<'a> {
    async fn create_installments(&mut self, installments: &[Installment]) -> RepositoryResult<()> {
        self.uow.enter(FailPoint::CreateInstallments).await?;
        self.target
            .write(Write::CreateInstallments(installments.to_vec()))
    }

    async fn set_installment_paid(
        &mut self,
        installment_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.uow.enter(FailPoint::SetInstallmentPaid).await?;
        self.target
            .write(Write::SetInstallmentPaid(installment_id, paid_at))
    }

    async fn get_installments_by_loan(
        &mut self,
        loan_id: Uuid,
    ) -> RepositoryResult<Vec<Installment>> {
        self.uow.enter(FailPoint::GetInstallments).await?;
        Ok(self.target.read(|state| state.installments_for(loan_id)))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    type Tx = MemoryTx;

    async fn begin(&self) -> RepositoryResult<Self::Tx> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.enter(FailPoint::Begin).await?;
        Ok(MemoryTx {
            staged: self.snapshot(),
            journal: Vec::new(),
        })
    }

    async fn commit(&self, tx: Self::Tx) -> RepositoryResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.enter(FailPoint::Commit).await?;

        let mut state = lock(&self.state);
        let mut next = state.clone();
        for write in &tx.journal {
            next.apply(write)?;
        }
        *state = next;
        Ok(())
    }

    async fn rollback(&self, _tx: Self::Tx) -> RepositoryResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.enter(FailPoint::Rollback).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.enter(FailPoint::Ping).await
    }

    fn loans(&self) -> Box<dyn LoanRepository + '_> {
        Box::new(MemoryRepository {
            uow: self,
            target: Target::Shared(&self.state),
        })
    }

    fn installments(&self) -> Box<dyn InstallmentRepository + '_> {
        Box::new(MemoryRepository {
            uow: self,
            target: Target::Shared(&self.state),
        })
    }

    fn tx_loans<'t>(&'t self, tx: &'t mut Self::Tx) -> Box<dyn LoanRepository + 't> {
        Box::new(MemoryRepository {
            uow: self,
            target: Target::Staged(tx),
        })
    }

    fn tx_installments<'t>(
        &'t self,
        tx: &'t mut Self::Tx,
    ) -> Box<dyn InstallmentRepository + 't> {
        Box::new(MemoryRepository {
            uow: self,
            target: Target::Staged(tx),
        })
    }
}
