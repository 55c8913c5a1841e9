//! Billing Engine Library
//!
//! Fixed-term installment loans: schedule generation, outstanding balance,
//! delinquency and payment application, persisted through a unit of work.

pub mod config;
pub mod error;
pub mod handlers;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
