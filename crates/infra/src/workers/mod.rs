//! Background workers.

pub mod audit_worker;
pub mod retry;

pub use audit_worker::{AuditError, AuditRouter, AuditWorker, WorkerHandle};
pub use retry::{BackoffStrategy, RetryPolicy};
