use chrono::Utc;
use tracing::{debug, instrument};

use fintrack_accounts::{AccountSnapshot, BalanceChanged};
use fintrack_core::{AccountId, Money, ReconciliationId, TransactionId};
use fintrack_transactions::{Reconciliation, ReconciliationRequested};

use crate::error::{LedgerError, StoreError};
use crate::store::{ReconciliationStore, SnapshotStore};

/// Sole writer of account snapshots. Rows are appended, never changed.
#[derive(Debug, Clone)]
pub struct SnapshotRecorder<S> {
    store: S,
}

impl<S> SnapshotRecorder<S>
where
    S: SnapshotStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err)]
    pub fn record(
        &self,
        account_id: AccountId,
        transaction_id: TransactionId,
        balance_before: Money,
        balance_after: Money,
        transaction_amount: Money,
    ) -> Result<AccountSnapshot, StoreError> {
        let snapshot = AccountSnapshot::record(
            account_id,
            transaction_id,
            balance_before,
            balance_after,
            transaction_amount,
            Utc::now(),
        );
        self.store.append(&snapshot)?;
        debug!(snapshot_id = %snapshot.id, "snapshot recorded");
        Ok(snapshot)
    }

    pub fn record_change(&self, change: &BalanceChanged) -> Result<AccountSnapshot, StoreError> {
        self.record(
            change.account_id,
            change.transaction_id,
            change.balance_before,
            change.balance_after,
            change.amount,
        )
    }

    pub fn for_account(&self, account_id: AccountId) -> Result<Vec<AccountSnapshot>, StoreError> {
        self.store.for_account(account_id)
    }

    pub fn for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AccountSnapshot>, StoreError> {
        self.store.for_transaction(transaction_id)
    }
}

/// Sole writer of reconciliation rows.
#[derive(Debug, Clone)]
pub struct ReconciliationRecorder<R> {
    store: R,
}

impl<R> ReconciliationRecorder<R>
where
    R: ReconciliationStore,
{
    pub fn new(store: R) -> Self {
        Self { store }
    }

    /// Append a `PENDING` row for a committed correction.
    #[instrument(skip(self, request), fields(original = %request.original_txn_id), err)]
    pub fn record(&self, request: &ReconciliationRequested) -> Result<Reconciliation, StoreError> {
        let reconciliation = Reconciliation::pending(request, Utc::now());
        self.store.append(&reconciliation)?;
        debug!(reconciliation_id = %reconciliation.id, "reconciliation recorded");
        Ok(reconciliation)
    }

    /// Close a pending row once the correction has been reviewed.
    pub fn complete(
        &self,
        id: ReconciliationId,
        remarks: Option<String>,
    ) -> Result<Reconciliation, LedgerError> {
        let mut reconciliation = self.store.find(id)?.ok_or_else(|| {
            LedgerError::Store(StoreError::NotFound(format!("reconciliation {id}")))
        })?;
        reconciliation.complete(remarks, Utc::now())?;
        self.store.update_status(&reconciliation)?;
        Ok(reconciliation)
    }

    pub fn for_original(
        &self,
        original_txn_id: TransactionId,
    ) -> Result<Vec<Reconciliation>, StoreError> {
        self.store.for_original(original_txn_id)
    }
}
