use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fintrack_core::{AccountId, Entity, Money, SnapshotId, TransactionId};

use crate::rules::AppliedEffect;

/// Immutable audit row: one per committed balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: SnapshotId,
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub balance_before: Money,
    pub balance_after: Money,
    pub transaction_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn record(
        account_id: AccountId,
        transaction_id: TransactionId,
        balance_before: Money,
        balance_after: Money,
        transaction_amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            account_id,
            transaction_id,
            balance_before,
            balance_after,
            transaction_amount,
            created_at: now,
        }
    }

    pub fn from_effect(effect: &AppliedEffect, now: DateTime<Utc>) -> Self {
        Self::record(
            effect.account_id,
            effect.transaction_id,
            effect.balance_before,
            effect.balance_after,
            effect.amount,
            now,
        )
    }

    /// Whether this row describes exactly `effect`.
    pub fn matches(&self, effect: &AppliedEffect) -> bool {
        self.account_id == effect.account_id
            && self.transaction_id == effect.transaction_id
            && self.balance_before == effect.balance_before
            && self.balance_after == effect.balance_after
            && self.transaction_amount == effect.amount
    }
}

impl Entity for AccountSnapshot {
    type Id = SnapshotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
