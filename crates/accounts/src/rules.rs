//! Category rules and balance mutation planning.
//!
//! Each [`AccountCategory`] dispatches through a static table entry holding its
//! delta and check functions. Planning is pure: it reads the locked account and
//! either returns the change to commit or the rejection, without touching state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fintrack_core::{AccountId, Amount, DomainError, DomainResult, Money, TransactionId};
use fintrack_transactions::{Transaction, TransactionType};

use crate::account::{Account, AccountBalance, AccountCategory};

/// Request to apply one transaction's effect to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMutationRequest {
    pub account_id: AccountId,
    pub amount: Amount,
    pub transaction_type: TransactionType,
    /// Correlation key for the audit trail; not checked for uniqueness.
    pub transaction_id: TransactionId,
}

impl BalanceMutationRequest {
    /// Validates the raw amount (zero allowed, negative rejected).
    pub fn new(
        account_id: AccountId,
        amount: Decimal,
        transaction_type: TransactionType,
        transaction_id: TransactionId,
    ) -> DomainResult<Self> {
        Ok(Self {
            account_id,
            amount: Amount::new(amount)?,
            transaction_type,
            transaction_id,
        })
    }

    pub fn from_transaction(txn: &Transaction) -> Self {
        Self {
            account_id: txn.account(),
            amount: txn.amount(),
            transaction_type: txn.kind(),
            transaction_id: txn.id_typed(),
        }
    }
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEffect {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub balance_before: Money,
    pub balance_after: Money,
    pub amount: Money,
}

impl AppliedEffect {
    pub fn delta(&self) -> Money {
        self.balance_after - self.balance_before
    }
}

struct CategoryRules {
    delta: fn(TransactionType, Money) -> Money,
    check: fn(&Account, &AccountBalance, Money, Money) -> DomainResult<()>,
}

static ASSET_RULES: CategoryRules = CategoryRules {
    delta: asset_delta,
    check: check_asset,
};

static LIABILITY_RULES: CategoryRules = CategoryRules {
    delta: liability_delta,
    check: check_liability,
};

impl AccountCategory {
    fn rules(self) -> &'static CategoryRules {
        match self {
            AccountCategory::Asset => &ASSET_RULES,
            AccountCategory::Liability => &LIABILITY_RULES,
        }
    }
}

fn asset_delta(kind: TransactionType, amount: Money) -> Money {
    match kind {
        TransactionType::Expense => -amount,
        TransactionType::Income => amount,
        TransactionType::Unknown => Decimal::ZERO,
    }
}

fn liability_delta(kind: TransactionType, amount: Money) -> Money {
    match kind {
        TransactionType::Expense => amount,
        TransactionType::Income => -amount,
        TransactionType::Unknown => Decimal::ZERO,
    }
}

fn check_asset(account: &Account, _: &AccountBalance, _delta: Money, new: Money) -> DomainResult<()> {
    if new < Decimal::ZERO {
        return Err(DomainError::NegativeBalance {
            account_id: account.id_typed(),
            attempted: new,
        });
    }
    Ok(())
}

fn check_liability(
    account: &Account,
    balance: &AccountBalance,
    delta: Money,
    new: Money,
) -> DomainResult<()> {
    if delta > Decimal::ZERO {
        if let Some(limit) = balance.credit_limit() {
            if new > limit {
                return Err(DomainError::CreditLimitExceeded {
                    account_id: account.id_typed(),
                    attempted: new,
                    limit,
                });
            }
        }
    }
    if new < Decimal::ZERO {
        return Err(DomainError::NegativeBalance {
            account_id: account.id_typed(),
            attempted: new,
        });
    }
    Ok(())
}

/// Compute and validate the effect of `request` on `account`.
///
/// Order: effective balance, delta, new balance, category check. Nothing is
/// written; a rejection leaves no trace.
pub fn plan_mutation(
    account: &Account,
    request: &BalanceMutationRequest,
) -> DomainResult<AppliedEffect> {
    account.ensure_active()?;
    if account.id_typed() != request.account_id {
        return Err(DomainError::invalid_operation(format!(
            "request for account {} applied to account {}",
            request.account_id,
            account.id_typed()
        )));
    }

    let rules = account.category().rules();
    let before = account.effective_balance();
    let delta = (rules.delta)(request.transaction_type, request.amount.value());
    let after = before.checked_add(delta).ok_or_else(|| {
        DomainError::validation(format!(
            "balance {before} cannot absorb a change of {delta}"
        ))
    })?;

    (rules.check)(account, account.balance(), delta, after)?;

    Ok(AppliedEffect {
        account_id: request.account_id,
        transaction_id: request.transaction_id,
        balance_before: before,
        balance_after: after,
        amount: request.amount.value(),
    })
}

impl Account {
    /// Write a planned effect into the balance and stamp `balance_as_of`.
    ///
    /// Only the ledger calls this, with the row lock held and the effect planned
    /// against this exact state.
    pub fn apply_effect(&mut self, effect: &AppliedEffect, now: DateTime<Utc>) {
        self.balance.set_effective(effect.balance_after);
        self.balance_as_of = Some(now);
    }
}
