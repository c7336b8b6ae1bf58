//! Account lifecycle: open, edit, close, and the read side (lookup, listing,
//! net worth).
//!
//! Balances are not editable here; they only move through the ledger.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument};

use fintrack_accounts::{Account, AccountChanges, NetWorthSummary, NewAccount};
use fintrack_core::{AccountId, DomainError, UserId};

use crate::error::{LedgerError, StoreError};
use crate::ledger::lock_account;
use crate::store::{AccountGuard, AccountStore};

#[derive(Debug)]
pub struct AccountManager<S> {
    store: S,
    lock_timeout: Option<Duration>,
    /// Serializes the duplicate last-four check with the write it guards.
    uniqueness: Mutex<()>,
}

impl<S> AccountManager<S>
where
    S: AccountStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock_timeout: None,
            uniqueness: Mutex::new(()),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, input), fields(account_type = ?input.account_type))]
    pub fn open_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let account = Account::open(input, Utc::now())?;

        let _unique = self.uniqueness.lock().map_err(|_| StoreError::Poisoned)?;
        self.ensure_unique_last_four(&account)?;
        self.store.insert(account.clone())?;

        info!(account_id = %account.id_typed(), "account opened");
        Ok(account)
    }

    /// Edit metadata under the row lock. A change of type or last four digits is
    /// checked against the owner's other open accounts.
    #[instrument(skip(self, changes))]
    pub fn update_account(
        &self,
        id: AccountId,
        changes: AccountChanges,
    ) -> Result<Account, LedgerError> {
        let identity_changes = changes.account_type.is_some() || changes.last_four.is_some();

        let _unique = self.uniqueness.lock().map_err(|_| StoreError::Poisoned)?;
        let guard = lock_account(&self.store, id, self.lock_timeout)?;
        let mut account = guard.account().clone();
        account.ensure_active()?;
        account.update(changes)?;

        if identity_changes {
            self.ensure_unique_last_four(&account)?;
        }

        guard.commit(account.clone())?;
        info!("account updated");
        Ok(account)
    }

    /// Soft close. Closed accounts reject every further balance mutation.
    #[instrument(skip(self))]
    pub fn close_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let guard = lock_account(&self.store, id, self.lock_timeout)?;
        let mut account = guard.account().clone();
        account.close(Utc::now())?;
        guard.commit(account.clone())?;
        info!("account closed");
        Ok(account)
    }

    pub fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .find(id)?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Open and closed accounts of `user_id`.
    pub fn list(&self, user_id: Option<UserId>) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_for_user(user_id)?)
    }

    pub fn net_worth(&self, user_id: Option<UserId>) -> Result<NetWorthSummary, LedgerError> {
        let accounts = self.store.list_for_user(user_id)?;
        Ok(NetWorthSummary::from_accounts(&accounts))
    }

    fn ensure_unique_last_four(&self, account: &Account) -> Result<(), LedgerError> {
        let taken = self
            .store
            .list_for_user(account.user_id())?
            .iter()
            .any(|other| {
                other.is_active()
                    && other.id_typed() != account.id_typed()
                    && other.account_type() == account.account_type()
                    && other.last_four() == account.last_four()
            });

        if taken {
            return Err(DomainError::DuplicateLastFour {
                account_type: account.account_type().to_string(),
                last_four: account.last_four().to_string(),
            }
            .into());
        }
        Ok(())
    }
}
