//! Balance ledger: the only writer of account balances.
//!
//! ```text
//! request
//!   ↓
//! 1. lock the account row (blocks while another mutation holds it)
//!   ↓
//! 2. plan: effective balance → delta → new balance → category check
//!   ↓
//! 3. commit new balance + balance_as_of, release the lock
//!   ↓
//! 4. publish BalanceChanged (snapshot is recorded off the critical path)
//! ```
//!
//! A rejected plan drops the guard: nothing is written and nothing is published.
//! Mutations on the same account apply in lock-acquisition order; different
//! accounts never wait on each other.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use fintrack_accounts::{AppliedEffect, BalanceChanged, BalanceMutationRequest, plan_mutation};
use fintrack_core::{AccountId, TransactionId};
use fintrack_events::EventBus;
use fintrack_transactions::{Transaction, TransactionType};

use crate::audit::{AuditMessage, AuditOutbox};
use crate::error::{LedgerError, StoreError};
use crate::store::{AccountGuard, AccountStore};

/// Take the row lock, reporting a missing row as `AccountNotFound`.
pub(crate) fn lock_account<S>(
    store: &S,
    id: AccountId,
    wait: Option<Duration>,
) -> Result<S::Guard<'_>, LedgerError>
where
    S: AccountStore,
{
    store.lock_for_update(id, wait).map_err(|err| match err {
        StoreError::NotFound(_) => LedgerError::AccountNotFound(id),
        other => other.into(),
    })
}

#[derive(Debug, Clone)]
pub struct BalanceLedger<S, B> {
    store: S,
    outbox: AuditOutbox<B>,
    lock_timeout: Option<Duration>,
}

impl<S, B> BalanceLedger<S, B>
where
    S: AccountStore,
    B: EventBus<AuditMessage>,
{
    /// Ledger that waits for row locks indefinitely.
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            outbox: AuditOutbox::new(bus),
            lock_timeout: None,
        }
    }

    /// Bound the row-lock wait; a request that waits longer fails with `LockTimeout`.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn outbox(&self) -> &AuditOutbox<B> {
        &self.outbox
    }

    /// Apply one transaction's effect to one account and return the committed
    /// `(before, after)` pair.
    #[instrument(
        skip(self, request),
        fields(
            account_id = %request.account_id,
            transaction_id = %request.transaction_id,
            kind = %request.transaction_type,
            amount = %request.amount.value(),
        )
    )]
    pub fn apply_transaction_effect(
        &self,
        request: &BalanceMutationRequest,
    ) -> Result<AppliedEffect, LedgerError> {
        let guard = lock_account(&self.store, request.account_id, self.lock_timeout)?;

        let effect = match plan_mutation(guard.account(), request) {
            Ok(effect) => effect,
            Err(err) => {
                warn!(error = %err, "balance mutation rejected");
                return Err(err.into());
            }
        };

        let now = Utc::now();
        let mut account = guard.account().clone();
        account.apply_effect(&effect, now);
        guard.commit(account)?;

        info!(
            before = %effect.balance_before,
            after = %effect.balance_after,
            "balance mutation committed"
        );

        self.outbox.publish(
            *effect.account_id.as_uuid(),
            &BalanceChanged::new(&effect, now),
        );

        Ok(effect)
    }

    /// Validate raw inputs, then apply. A negative amount fails with `Validation`
    /// before any lock is taken.
    pub fn apply(
        &self,
        account_id: AccountId,
        amount: Decimal,
        transaction_type: TransactionType,
        transaction_id: TransactionId,
    ) -> Result<AppliedEffect, LedgerError> {
        let request =
            BalanceMutationRequest::new(account_id, amount, transaction_type, transaction_id)?;
        self.apply_transaction_effect(&request)
    }

    /// Post a journal row's effect.
    pub fn post(&self, txn: &Transaction) -> Result<AppliedEffect, LedgerError> {
        self.apply_transaction_effect(&BalanceMutationRequest::from_transaction(txn))
    }
}
