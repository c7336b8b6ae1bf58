use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fintrack_core::{AccountId, Money, TransactionId};
use fintrack_events::Event;

use crate::rules::AppliedEffect;

/// Published after a balance mutation commits. Consumed by the snapshot recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChanged {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub balance_before: Money,
    pub balance_after: Money,
    pub amount: Money,
    pub committed_at: DateTime<Utc>,
}

impl BalanceChanged {
    pub const EVENT_TYPE: &'static str = "accounts.balance_changed";

    pub fn new(effect: &AppliedEffect, committed_at: DateTime<Utc>) -> Self {
        Self {
            account_id: effect.account_id,
            transaction_id: effect.transaction_id,
            balance_before: effect.balance_before,
            balance_after: effect.balance_after,
            amount: effect.amount,
            committed_at,
        }
    }
}

impl Event for BalanceChanged {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.committed_at
    }
}
