use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fintrack_core::{AccountId, Amount, DomainError, Entity, TransactionId, UserId};

/// Direction of a transaction from the account holder's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
    /// Parsed from a source that could not tell the direction; has no balance effect.
    Unknown,
}

impl TransactionType {
    /// The type whose balance effect cancels this one.
    ///
    /// `Unknown` has no effect to cancel and passes through unchanged.
    pub fn flipped(self) -> Self {
        match self {
            TransactionType::Income => TransactionType::Expense,
            TransactionType::Expense => TransactionType::Income,
            TransactionType::Unknown => TransactionType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Unknown => "unknown",
        }
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    /// Case-insensitive lookup ("income", "EXPENSE", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            TransactionType::Income,
            TransactionType::Expense,
            TransactionType::Unknown,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| DomainError::validation(format!("unknown transaction type: {s}")))
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row status in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Posted; its effect is part of the account balance.
    Active,
    /// Superseded (deleted or replaced). Terminal.
    Inactive,
    /// Compensating row that cancels an original. Terminal.
    Reversal,
    /// Captured but never posted (e.g. parsed from an SMS, awaiting review).
    Draft,
}

/// Last bookkeeping action applied to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LastAction {
    Created,
    Updated,
    /// Draft discarded without ever touching a balance.
    Deleted,
    /// Posted row cancelled by a reversal.
    PartialDeleted,
    Replaced,
    Reversal,
}

/// Where the row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    #[default]
    Manual,
    Sms,
    Statement,
}

/// Descriptive fields. Editing these never touches a balance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub name: String,
    pub merchant: Option<String>,
    pub notes: Option<String>,
    /// Category label; the taxonomy itself lives elsewhere.
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub currency: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub attachments: Option<String>,
    pub external_ref: Option<String>,
}

/// Input for a brand-new journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Amount,
    pub kind: TransactionType,
    pub account: AccountId,
    pub user_id: Option<UserId>,
    pub source: TransactionSource,
    pub details: TransactionDetails,
}

/// A journal row.
///
/// Financial fields (`amount`, `kind`, `account`) are fixed at construction.
/// State only moves forward along
/// `Draft → Active(Created) → Inactive(PartialDeleted | Replaced)`; reversal rows
/// are born `Reversal` and never move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) amount: Amount,
    pub(crate) kind: TransactionType,
    pub(crate) account: AccountId,
    pub(crate) status: TransactionStatus,
    pub(crate) last_action: LastAction,
    pub(crate) reversal_of: Option<TransactionId>,
    pub(crate) user_id: Option<UserId>,
    pub(crate) source: TransactionSource,
    pub(crate) details: TransactionDetails,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A posted row (`Active`, `Created`).
    pub fn new(input: NewTransaction, now: DateTime<Utc>) -> Result<Self, DomainError> {
        Self::build(input, TransactionStatus::Active, now)
    }

    /// An unposted row awaiting confirmation (`Draft`, `Created`).
    pub fn draft(input: NewTransaction, now: DateTime<Utc>) -> Result<Self, DomainError> {
        Self::build(input, TransactionStatus::Draft, now)
    }

    fn build(
        input: NewTransaction,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if input.amount.is_zero() {
            return Err(DomainError::validation("transaction amount must be positive"));
        }

        Ok(Self {
            id: TransactionId::new(),
            amount: input.amount,
            kind: input.kind,
            account: input.account,
            status,
            last_action: LastAction::Created,
            reversal_of: None,
            user_id: input.user_id,
            source: input.source,
            details: input.details,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn last_action(&self) -> LastAction {
        self.last_action
    }

    pub fn reversal_of(&self) -> Option<TransactionId> {
        self.reversal_of
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn source(&self) -> TransactionSource {
        self.source
    }

    pub fn details(&self) -> &TransactionDetails {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether this row's effect is currently part of an account balance.
    pub fn is_posted(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Delete already happened (or was already started by an interrupted run).
    pub fn is_deleted(&self) -> bool {
        matches!(
            self.last_action,
            LastAction::Deleted | LastAction::PartialDeleted
        )
    }

    /// Draft → Active. The caller applies the balance effect.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Draft {
            return Err(DomainError::invalid_operation(format!(
                "transaction {} is not a draft",
                self.id
            )));
        }
        self.status = TransactionStatus::Active;
        self.last_action = LastAction::Created;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
