//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{AccountId, TransactionId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// balance invariants, illegal state transitions). Infrastructure concerns
/// (storage, lock waits) belong to the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No active account matches the identifier.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// An asset balance or liability outstanding would drop below zero.
    #[error("balance of account {account_id} would become negative ({attempted})")]
    NegativeBalance {
        account_id: AccountId,
        attempted: Decimal,
    },

    /// A liability charge would push the outstanding past the credit limit.
    #[error("charge on account {account_id} would exceed credit limit {limit} ({attempted})")]
    CreditLimitExceeded {
        account_id: AccountId,
        attempted: Decimal,
        limit: Decimal,
    },

    /// Correction target is missing from the journal.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The requested transition is not allowed from the row's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Another account of the same type already uses these last four digits.
    #[error("another {account_type} account already has last four digits {last_four}")]
    DuplicateLastFour {
        account_type: String,
        last_four: String,
    },

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Whether the error is a balance invariant rejection (detected before any write).
    pub fn is_balance_rejection(&self) -> bool {
        matches!(
            self,
            Self::NegativeBalance { .. } | Self::CreditLimitExceeded { .. }
        )
    }
}
