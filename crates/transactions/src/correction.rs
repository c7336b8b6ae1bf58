//! Correction rules for journal rows.
//!
//! A correction never edits `amount`, `kind` or `account` of a stored row. It either
//! merges descriptive fields in place, or supersedes the row with a reversal (and,
//! for edits, a replacement). The functions here only build the rows; applying
//! their balance effects and persisting them is the engine's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fintrack_core::{AccountId, Amount, DomainError, TransactionId};

use crate::transaction::{LastAction, Transaction, TransactionStatus, TransactionType};

const REVERSAL_SUFFIX: &str = " (Reversal)";
const DELETED_SUFFIX: &str = " (Deleted)";

/// Partial edit of a journal row. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTransactionRequest {
    pub amount: Option<Amount>,
    pub kind: Option<TransactionType>,
    pub account: Option<AccountId>,
    pub name: Option<String>,
    pub merchant: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub currency: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub attachments: Option<String>,
    pub external_ref: Option<String>,
}

/// How an update has to be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Only descriptive fields change (or nothing at all): merge in place.
    InPlace,
    /// Amount, type or account changes: reverse and replace.
    Structural,
}

impl Transaction {
    /// Rejects rows that can no longer be corrected.
    ///
    /// Reversal rows are never reversed or updated, and inactive rows are terminal.
    pub fn ensure_correctable(&self) -> Result<(), DomainError> {
        match self.status {
            TransactionStatus::Reversal => Err(DomainError::invalid_operation(format!(
                "transaction {} is a reversal and cannot be corrected",
                self.id
            ))),
            TransactionStatus::Inactive => Err(DomainError::invalid_operation(format!(
                "transaction {} is inactive ({:?})",
                self.id, self.last_action
            ))),
            TransactionStatus::Active | TransactionStatus::Draft => Ok(()),
        }
    }

    /// Structural iff a provided amount, type or account differs from the stored one.
    ///
    /// Drafts have no balance effect yet, so every change on a draft is in place.
    pub fn classify(&self, request: &UpdateTransactionRequest) -> ChangeKind {
        if self.status == TransactionStatus::Draft {
            return ChangeKind::InPlace;
        }

        let differs = request.amount.is_some_and(|a| a != self.amount)
            || request.kind.is_some_and(|k| k != self.kind)
            || request.account.is_some_and(|a| a != self.account);

        if differs {
            ChangeKind::Structural
        } else {
            ChangeKind::InPlace
        }
    }

    /// Compensating row: same amount and account, type flipped.
    pub fn build_reversal(&self, now: DateTime<Utc>) -> Transaction {
        let mut details = self.details.clone();
        details.name.push_str(REVERSAL_SUFFIX);

        Transaction {
            id: TransactionId::new(),
            amount: self.amount,
            kind: self.kind.flipped(),
            account: self.account,
            status: TransactionStatus::Reversal,
            last_action: LastAction::Reversal,
            reversal_of: Some(self.id),
            user_id: self.user_id,
            source: self.source,
            details,
            created_at: now,
            updated_at: now,
        }
    }

    /// Row that posts the edited values: the original merged with `request`.
    pub fn build_replacement(
        &self,
        request: &UpdateTransactionRequest,
        now: DateTime<Utc>,
    ) -> Transaction {
        let mut replacement = Transaction {
            id: TransactionId::new(),
            amount: request.amount.unwrap_or(self.amount),
            kind: request.kind.unwrap_or(self.kind),
            account: request.account.unwrap_or(self.account),
            status: TransactionStatus::Active,
            last_action: LastAction::Created,
            reversal_of: None,
            user_id: self.user_id,
            source: self.source,
            details: self.details.clone(),
            created_at: now,
            updated_at: now,
        };
        replacement.merge_details(request);
        replacement
    }

    /// Same values as this row under a fresh id; used to put the original effect
    /// back after a rejected replacement.
    pub fn build_repost(&self, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            amount: self.amount,
            kind: self.kind,
            account: self.account,
            status: TransactionStatus::Active,
            last_action: LastAction::Created,
            reversal_of: None,
            user_id: self.user_id,
            source: self.source,
            details: self.details.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Posted row cancelled by a reversal.
    pub fn mark_partially_deleted(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Inactive;
        self.last_action = LastAction::PartialDeleted;
        self.details.name.push_str(DELETED_SUFFIX);
        self.updated_at = now;
    }

    /// Draft discarded; it never had a balance effect.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Inactive;
        self.last_action = LastAction::Deleted;
        self.details.name.push_str(DELETED_SUFFIX);
        self.updated_at = now;
    }

    pub fn mark_replaced(&mut self, now: DateTime<Utc>) {
        self.status = TransactionStatus::Inactive;
        self.last_action = LastAction::Replaced;
        self.updated_at = now;
    }

    /// Merge an in-place edit.
    ///
    /// For drafts the financial fields may change too, since nothing was posted.
    pub fn apply_in_place(&mut self, request: &UpdateTransactionRequest, now: DateTime<Utc>) {
        if self.status == TransactionStatus::Draft {
            if let Some(amount) = request.amount {
                self.amount = amount;
            }
            if let Some(kind) = request.kind {
                self.kind = kind;
            }
            if let Some(account) = request.account {
                self.account = account;
            }
        }
        self.merge_details(request);
        self.last_action = LastAction::Updated;
        self.updated_at = now;
    }

    fn merge_details(&mut self, request: &UpdateTransactionRequest) {
        let d = &mut self.details;
        if let Some(name) = &request.name {
            d.name = name.clone();
        }
        if let Some(v) = &request.merchant {
            d.merchant = Some(v.clone());
        }
        if let Some(v) = &request.notes {
            d.notes = Some(v.clone());
        }
        if let Some(v) = &request.category {
            d.category = Some(v.clone());
        }
        if let Some(v) = &request.tags {
            d.tags = v.clone();
        }
        if let Some(v) = &request.currency {
            d.currency = Some(v.clone());
        }
        if let Some(v) = request.occurred_at {
            d.occurred_at = Some(v);
        }
        if let Some(v) = request.posted_at {
            d.posted_at = Some(v);
        }
        if let Some(v) = &request.attachments {
            d.attachments = Some(v.clone());
        }
        if let Some(v) = &request.external_ref {
            d.external_ref = Some(v.clone());
        }
    }
}
