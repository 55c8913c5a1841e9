//! Middleware for the billing engine API

mod tracing;

pub use self::tracing::request_tracing;
