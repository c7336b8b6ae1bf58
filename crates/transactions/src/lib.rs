//! Transaction journal domain (append-only corrections).
//!
//! Pure domain logic only: no IO, no persistence. Journal rows are never edited
//! in their financial fields; deletes and structural edits are expressed as a
//! reversal row (and, for edits, a replacement row) while the original row only
//! changes status.

pub mod correction;
pub mod reconciliation;
pub mod transaction;

pub use correction::{ChangeKind, UpdateTransactionRequest};
pub use reconciliation::{Reconciliation, ReconciliationRequested, ReconciliationStatus};
pub use transaction::{
    LastAction, NewTransaction, Transaction, TransactionDetails, TransactionSource,
    TransactionStatus, TransactionType,
};
