//! Infrastructure layer: stores, the balance ledger, the correction engine,
//! account management, the after-commit audit trail and its worker.

pub mod account_manager;
pub mod audit;
pub mod config;
pub mod correction;
pub mod error;
pub mod ledger;
pub mod services;
pub mod store;
pub mod workers;

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod integration_tests;

pub use account_manager::AccountManager;
pub use audit::{AuditMessage, AuditOutbox, ReconciliationRecorder, SnapshotRecorder};
pub use config::{ConfigError, LedgerConfig};
pub use correction::{CorrectionEngine, DeleteOutcome};
pub use error::{LedgerError, StoreError};
pub use ledger::BalanceLedger;
pub use services::{InMemoryServices, LedgerServices, PostgresServices, ServicesError};
