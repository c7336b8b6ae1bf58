//! Storage seams.
//!
//! Traits are synchronous; the Postgres adapters bridge to sqlx through a tokio
//! runtime handle. In-memory adapters back tests and single-process use.

use std::sync::Arc;
use std::time::Duration;

use fintrack_accounts::{Account, AccountSnapshot};
use fintrack_core::{AccountId, ReconciliationId, TransactionId, UserId};
use fintrack_transactions::{Reconciliation, Transaction};

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::{
    InMemoryAccountGuard, InMemoryAccountStore, InMemoryReconciliationStore,
    InMemorySnapshotStore, InMemoryTransactionJournal,
};
pub use postgres::{
    PostgresAccountGuard, PostgresAccountStore, PostgresReconciliationStore,
    PostgresSnapshotStore,
};

/// Exclusive hold on one account row.
///
/// Dropping the guard without committing releases the lock and discards any
/// pending change.
pub trait AccountGuard {
    /// Row state as read under the lock.
    fn account(&self) -> &Account;

    /// Persist `account` as the new row state and release the lock.
    fn commit(self, account: Account) -> Result<(), StoreError>;
}

/// Account rows with an exclusive, blocking per-row lock.
///
/// Only one guard per account exists at a time; other accounts are unaffected.
/// Plain reads (`find`, `list_for_user`) never wait for a lock.
pub trait AccountStore: Send + Sync {
    type Guard<'a>: AccountGuard
    where
        Self: 'a;

    /// Block until the row lock is granted. `wait` bounds the wait
    /// (`StoreError::LockTimeout`); `None` waits indefinitely.
    fn lock_for_update(
        &self,
        id: AccountId,
        wait: Option<Duration>,
    ) -> Result<Self::Guard<'_>, StoreError>;

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Add a new row. Fails with `Conflict` when the id is taken.
    fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// All rows (open and closed) owned by `user_id`.
    fn list_for_user(&self, user_id: Option<UserId>) -> Result<Vec<Account>, StoreError>;
}

impl<S> AccountStore for Arc<S>
where
    S: AccountStore,
{
    type Guard<'a>
        = S::Guard<'a>
    where
        Self: 'a;

    fn lock_for_update(
        &self,
        id: AccountId,
        wait: Option<Duration>,
    ) -> Result<Self::Guard<'_>, StoreError> {
        (**self).lock_for_update(id, wait)
    }

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).find(id)
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        (**self).insert(account)
    }

    fn list_for_user(&self, user_id: Option<UserId>) -> Result<Vec<Account>, StoreError> {
        (**self).list_for_user(user_id)
    }
}

/// Journal of transaction rows.
pub trait TransactionJournal: Send + Sync {
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Insert or overwrite one row.
    fn save(&self, txn: &Transaction) -> Result<(), StoreError>;

    /// Insert or overwrite several rows as one atomic batch.
    fn save_all(&self, txns: &[Transaction]) -> Result<(), StoreError> {
        self.write_batch(txns, &[])
    }

    /// Upsert `save` and drop the `discard` rows, all or nothing.
    fn write_batch(
        &self,
        save: &[Transaction],
        discard: &[TransactionId],
    ) -> Result<(), StoreError>;

    /// Reversal rows pointing back at `original`.
    fn find_reversals_of(&self, original: TransactionId) -> Result<Vec<Transaction>, StoreError>;
}

impl<J> TransactionJournal for Arc<J>
where
    J: TransactionJournal + ?Sized,
{
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        (**self).find_by_id(id)
    }

    fn save(&self, txn: &Transaction) -> Result<(), StoreError> {
        (**self).save(txn)
    }

    fn save_all(&self, txns: &[Transaction]) -> Result<(), StoreError> {
        (**self).save_all(txns)
    }

    fn write_batch(
        &self,
        save: &[Transaction],
        discard: &[TransactionId],
    ) -> Result<(), StoreError> {
        (**self).write_batch(save, discard)
    }

    fn find_reversals_of(&self, original: TransactionId) -> Result<Vec<Transaction>, StoreError> {
        (**self).find_reversals_of(original)
    }
}

/// Append-only snapshot rows. Results come back in append order.
pub trait SnapshotStore: Send + Sync {
    fn append(&self, snapshot: &AccountSnapshot) -> Result<(), StoreError>;

    fn for_account(&self, account_id: AccountId) -> Result<Vec<AccountSnapshot>, StoreError>;

    fn for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AccountSnapshot>, StoreError>;
}

impl<S> SnapshotStore for Arc<S>
where
    S: SnapshotStore + ?Sized,
{
    fn append(&self, snapshot: &AccountSnapshot) -> Result<(), StoreError> {
        (**self).append(snapshot)
    }

    fn for_account(&self, account_id: AccountId) -> Result<Vec<AccountSnapshot>, StoreError> {
        (**self).for_account(account_id)
    }

    fn for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AccountSnapshot>, StoreError> {
        (**self).for_transaction(transaction_id)
    }
}

/// Reconciliation rows. New rows are appended; only their status may change later.
pub trait ReconciliationStore: Send + Sync {
    fn append(&self, reconciliation: &Reconciliation) -> Result<(), StoreError>;

    fn find(&self, id: ReconciliationId) -> Result<Option<Reconciliation>, StoreError>;

    /// Overwrite status, remarks and completion time of an existing row.
    fn update_status(&self, reconciliation: &Reconciliation) -> Result<(), StoreError>;

    fn for_original(
        &self,
        original_txn_id: TransactionId,
    ) -> Result<Vec<Reconciliation>, StoreError>;
}

impl<R> ReconciliationStore for Arc<R>
where
    R: ReconciliationStore + ?Sized,
{
    fn append(&self, reconciliation: &Reconciliation) -> Result<(), StoreError> {
        (**self).append(reconciliation)
    }

    fn find(&self, id: ReconciliationId) -> Result<Option<Reconciliation>, StoreError> {
        (**self).find(id)
    }

    fn update_status(&self, reconciliation: &Reconciliation) -> Result<(), StoreError> {
        (**self).update_status(reconciliation)
    }

    fn for_original(
        &self,
        original_txn_id: TransactionId,
    ) -> Result<Vec<Reconciliation>, StoreError> {
        (**self).for_original(original_txn_id)
    }
}
