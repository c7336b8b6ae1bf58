//! Infrastructure and caller-facing error types.

use rust_decimal::Decimal;
use thiserror::Error;

use fintrack_core::{AccountId, DomainError, TransactionId};

/// Storage adapter failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// The row lock was not granted within the configured wait.
    #[error("timed out waiting for the lock on account {0}")]
    LockTimeout(AccountId),

    /// A uniqueness rule rejected the write (duplicate id or key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error returned by the ledger, the correction engine and account management.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("balance of account {account_id} would become negative ({attempted})")]
    NegativeBalance {
        account_id: AccountId,
        attempted: Decimal,
    },

    #[error("charge on account {account_id} would exceed credit limit {limit} ({attempted})")]
    CreditLimitExceeded {
        account_id: AccountId,
        attempted: Decimal,
        limit: Decimal,
    },

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("timed out waiting for the lock on account {0}")]
    LockTimeout(AccountId),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("another {account_type} account already has last four digits {last_four}")]
    DuplicateLastFour {
        account_type: String,
        last_four: String,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl LedgerError {
    /// Rejected by a balance invariant; nothing was written.
    pub fn is_balance_rejection(&self) -> bool {
        matches!(
            self,
            Self::NegativeBalance { .. } | Self::CreditLimitExceeded { .. }
        )
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::AccountNotFound(id) => LedgerError::AccountNotFound(id),
            DomainError::NegativeBalance {
                account_id,
                attempted,
            } => LedgerError::NegativeBalance {
                account_id,
                attempted,
            },
            DomainError::CreditLimitExceeded {
                account_id,
                attempted,
                limit,
            } => LedgerError::CreditLimitExceeded {
                account_id,
                attempted,
                limit,
            },
            DomainError::TransactionNotFound(id) => LedgerError::TransactionNotFound(id),
            DomainError::InvalidOperation(msg) => LedgerError::InvalidOperation(msg),
            DomainError::DuplicateLastFour {
                account_type,
                last_four,
            } => LedgerError::DuplicateLastFour {
                account_type,
                last_four,
            },
            DomainError::Validation(msg) => LedgerError::Validation(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::LockTimeout(id) => LedgerError::LockTimeout(id),
            other => LedgerError::Store(other),
        }
    }
}
