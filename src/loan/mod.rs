//! Loan domain: models, product parameters and the pure calculations
//! (schedule, balance, delinquency) used by the workflows.

pub mod balance;
pub mod delinquency;
pub mod model;
pub mod product;
pub mod schedule;

pub use balance::outstanding_balance;
pub use delinquency::is_delinquent;
pub use model::{Delinquency, Installment, Loan, LoanStatus, Outstanding, PaymentReceipt};
pub use product::{DelinquencyRule, LoanProduct, ProductError};
pub use schedule::generate_schedule;
