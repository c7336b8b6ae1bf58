//! In-memory stores for tests/dev and single-process deployments.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use fintrack_accounts::{Account, AccountSnapshot};
use fintrack_core::{AccountId, Entity, ReconciliationId, TransactionId, UserId};
use fintrack_transactions::{Reconciliation, Transaction};

use super::{AccountGuard, AccountStore, ReconciliationStore, SnapshotStore, TransactionJournal};
use crate::error::StoreError;

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Poisoned
}

#[derive(Debug)]
struct RowState {
    locked: bool,
    account: Account,
}

/// One account row: committed state plus the lock flag, guarded by a mutex, with a
/// condvar to park waiters until the holder releases.
#[derive(Debug)]
struct Row {
    state: Mutex<RowState>,
    released: Condvar,
}

impl Row {
    fn release(&self, committed: Option<Account>) {
        // A poisoned row is still released so waiters are not parked forever.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(account) = committed {
            state.account = account;
        }
        state.locked = false;
        drop(state);
        self.released.notify_one();
    }
}

/// Account store with per-row `Mutex` + `Condvar` locks.
///
/// The map itself is only read-locked while looking a row up, so holders of
/// different rows never contend.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    rows: RwLock<HashMap<AccountId, Arc<Row>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: AccountId) -> Result<Arc<Row>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        rows.get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }
}

/// Lock on one in-memory row.
#[derive(Debug)]
pub struct InMemoryAccountGuard<'a> {
    row: Arc<Row>,
    account: Account,
    released: bool,
    _store: PhantomData<&'a InMemoryAccountStore>,
}

impl AccountGuard for InMemoryAccountGuard<'_> {
    fn account(&self) -> &Account {
        &self.account
    }

    fn commit(mut self, account: Account) -> Result<(), StoreError> {
        if account.id() != self.account.id() {
            return Err(StoreError::Conflict(format!(
                "guard for account {} cannot commit account {}",
                self.account.id(),
                account.id()
            )));
        }
        self.released = true;
        self.row.release(Some(account));
        Ok(())
    }
}

impl Drop for InMemoryAccountGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.row.release(None);
        }
    }
}

impl AccountStore for InMemoryAccountStore {
    type Guard<'a> = InMemoryAccountGuard<'a>;

    fn lock_for_update(
        &self,
        id: AccountId,
        wait: Option<Duration>,
    ) -> Result<Self::Guard<'_>, StoreError> {
        let row = self.row(id)?;

        let account = {
            let state = row.state.lock().map_err(poisoned)?;
            let mut state: MutexGuard<'_, RowState> = match wait {
                None => row
                    .released
                    .wait_while(state, |s| s.locked)
                    .map_err(poisoned)?,
                Some(timeout) => {
                    let (state, _) = row
                        .released
                        .wait_timeout_while(state, timeout, |s| s.locked)
                        .map_err(poisoned)?;
                    if state.locked {
                        return Err(StoreError::LockTimeout(id));
                    }
                    state
                }
            };
            state.locked = true;
            state.account.clone()
        };

        Ok(InMemoryAccountGuard {
            row,
            account,
            released: false,
            _store: PhantomData,
        })
    }

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = match self.row(id) {
            Ok(row) => row,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let state = row.state.lock().map_err(poisoned)?;
        Ok(Some(state.account.clone()))
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let id = account.id_typed();
        if rows.contains_key(&id) {
            return Err(StoreError::Conflict(format!("account {id} already exists")));
        }
        rows.insert(
            id,
            Arc::new(Row {
                state: Mutex::new(RowState {
                    locked: false,
                    account,
                }),
                released: Condvar::new(),
            }),
        );
        Ok(())
    }

    fn list_for_user(&self, user_id: Option<UserId>) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<Arc<Row>> = {
            let rows = self.rows.read().map_err(poisoned)?;
            rows.values().cloned().collect()
        };

        let mut accounts = Vec::new();
        for row in rows {
            let state = row.state.lock().map_err(poisoned)?;
            if state.account.user_id() == user_id {
                accounts.push(state.account.clone());
            }
        }
        accounts.sort_by_key(|a| a.id_typed());
        Ok(accounts)
    }
}

/// Journal backed by a single map; a batch holds the write lock throughout.
#[derive(Debug, Default)]
pub struct InMemoryTransactionJournal {
    rows: RwLock<HashMap<TransactionId, Transaction>>,
}

impl InMemoryTransactionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionJournal for InMemoryTransactionJournal {
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    fn save(&self, txn: &Transaction) -> Result<(), StoreError> {
        self.save_all(std::slice::from_ref(txn))
    }

    fn write_batch(
        &self,
        save: &[Transaction],
        discard: &[TransactionId],
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        for id in discard {
            rows.remove(id);
        }
        for txn in save {
            rows.insert(txn.id_typed(), txn.clone());
        }
        Ok(())
    }

    fn find_reversals_of(&self, original: TransactionId) -> Result<Vec<Transaction>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut reversals: Vec<Transaction> = rows
            .values()
            .filter(|t| t.reversal_of() == Some(original))
            .cloned()
            .collect();
        reversals.sort_by_key(|t| t.id_typed());
        Ok(reversals)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rows: RwLock<Vec<AccountSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn append(&self, snapshot: &AccountSnapshot) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.push(snapshot.clone());
        Ok(())
    }

    fn for_account(&self, account_id: AccountId) -> Result<Vec<AccountSnapshot>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }

    fn for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AccountSnapshot>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|s| s.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReconciliationStore {
    rows: RwLock<Vec<Reconciliation>>,
}

impl InMemoryReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReconciliationStore for InMemoryReconciliationStore {
    fn append(&self, reconciliation: &Reconciliation) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.push(reconciliation.clone());
        Ok(())
    }

    fn find(&self, id: ReconciliationId) -> Result<Option<Reconciliation>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    fn update_status(&self, reconciliation: &Reconciliation) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == reconciliation.id)
            .ok_or_else(|| StoreError::NotFound(format!("reconciliation {}", reconciliation.id)))?;
        row.status = reconciliation.status;
        row.remarks = reconciliation.remarks.clone();
        row.completed_at = reconciliation.completed_at;
        Ok(())
    }

    fn for_original(
        &self,
        original_txn_id: TransactionId,
    ) -> Result<Vec<Reconciliation>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|r| r.original_txn_id == original_txn_id)
            .cloned()
            .collect())
    }
}
