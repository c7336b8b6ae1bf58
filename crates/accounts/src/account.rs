use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fintrack_core::{AccountId, DomainError, DomainResult, Entity, Money, UserId};

/// Kind of account as shown to the user. Fixes the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Bank,
    Cash,
    Investment,
    #[serde(alias = "CREDIT CARD")]
    CreditCard,
    Loan,
}

impl AccountType {
    pub fn category(self) -> AccountCategory {
        match self {
            AccountType::Bank | AccountType::Cash | AccountType::Investment => {
                AccountCategory::Asset
            }
            AccountType::CreditCard | AccountType::Loan => AccountCategory::Liability,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Bank => "BANK",
            AccountType::Cash => "CASH",
            AccountType::Investment => "INVESTMENT",
            AccountType::CreditCard => "CREDIT_CARD",
            AccountType::Loan => "LOAN",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Balance semantics of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountCategory {
    /// Holds money (bank, cash, investment). Balance never below zero.
    Asset,
    /// Owes money (credit card, loan). Outstanding in `[0, credit_limit]`.
    Liability,
}

/// Balance state; the variant is picked from the category at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountBalance {
    Asset {
        starting_balance: Option<Money>,
        current_balance: Option<Money>,
    },
    Liability {
        current_outstanding: Option<Money>,
        /// `None` means no limit.
        credit_limit: Option<Money>,
    },
}

impl AccountBalance {
    pub fn category(&self) -> AccountCategory {
        match self {
            AccountBalance::Asset { .. } => AccountCategory::Asset,
            AccountBalance::Liability { .. } => AccountCategory::Liability,
        }
    }

    /// Balance the next mutation starts from.
    ///
    /// Assets fall back to the starting balance until the first mutation.
    pub fn effective(&self) -> Money {
        match self {
            AccountBalance::Asset {
                starting_balance,
                current_balance,
            } => current_balance
                .or(*starting_balance)
                .unwrap_or(Decimal::ZERO),
            AccountBalance::Liability {
                current_outstanding,
                ..
            } => current_outstanding.unwrap_or(Decimal::ZERO),
        }
    }

    pub fn credit_limit(&self) -> Option<Money> {
        match self {
            AccountBalance::Liability { credit_limit, .. } => *credit_limit,
            AccountBalance::Asset { .. } => None,
        }
    }

    pub(crate) fn set_effective(&mut self, value: Money) {
        match self {
            AccountBalance::Asset {
                current_balance, ..
            } => *current_balance = Some(value),
            AccountBalance::Liability {
                current_outstanding,
                ..
            } => *current_outstanding = Some(value),
        }
    }
}

/// Input for opening an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewAccount {
    pub user_id: Option<UserId>,
    pub name: String,
    pub account_type: Option<AccountType>,
    pub last_four: String,
    pub currency: String,
    pub opening_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Asset accounts only.
    pub starting_balance: Option<Money>,
    /// Liability accounts only.
    pub current_outstanding: Option<Money>,
    /// Liability accounts only.
    pub credit_limit: Option<Money>,
    pub statement_day_of_month: Option<u8>,
    pub due_day_of_month: Option<u8>,
}

/// Metadata edit. Balances are not editable here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub last_four: Option<String>,
    pub currency: Option<String>,
    pub opening_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub credit_limit: Option<Money>,
    pub statement_day_of_month: Option<u8>,
    pub due_day_of_month: Option<u8>,
}

/// A financial account owned by a user.
///
/// The balance is only ever changed through [`Account::apply_effect`], which
/// the ledger calls while holding the row lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    user_id: Option<UserId>,
    name: String,
    account_type: AccountType,
    last_four: String,
    currency: String,
    opening_date: Option<NaiveDate>,
    notes: Option<String>,
    statement_day_of_month: Option<u8>,
    due_day_of_month: Option<u8>,
    pub(crate) balance: AccountBalance,
    pub(crate) balance_as_of: Option<DateTime<Utc>>,
    active: bool,
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl Account {
    pub fn open(input: NewAccount, now: DateTime<Utc>) -> DomainResult<Self> {
        let account_type = input
            .account_type
            .ok_or_else(|| DomainError::validation("account type is required"))?;
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        validate_last_four(&input.last_four)?;
        validate_day(input.statement_day_of_month)?;
        validate_day(input.due_day_of_month)?;

        let balance = match account_type.category() {
            AccountCategory::Asset => {
                if input.current_outstanding.is_some() || input.credit_limit.is_some() {
                    return Err(DomainError::validation(
                        "outstanding and credit limit only apply to liability accounts",
                    ));
                }
                non_negative("starting balance", input.starting_balance)?;
                AccountBalance::Asset {
                    starting_balance: input.starting_balance,
                    current_balance: None,
                }
            }
            AccountCategory::Liability => {
                if input.starting_balance.is_some() {
                    return Err(DomainError::validation(
                        "starting balance only applies to asset accounts",
                    ));
                }
                non_negative("current outstanding", input.current_outstanding)?;
                non_negative("credit limit", input.credit_limit)?;
                if let (Some(outstanding), Some(limit)) =
                    (input.current_outstanding, input.credit_limit)
                {
                    if outstanding > limit {
                        return Err(DomainError::validation(format!(
                            "outstanding {outstanding} exceeds credit limit {limit}"
                        )));
                    }
                }
                AccountBalance::Liability {
                    current_outstanding: input.current_outstanding,
                    credit_limit: input.credit_limit,
                }
            }
        };

        Ok(Self {
            id: AccountId::new(),
            user_id: input.user_id,
            name: input.name,
            account_type,
            last_four: input.last_four,
            currency: input.currency,
            opening_date: input.opening_date,
            notes: input.notes,
            statement_day_of_month: input.statement_day_of_month,
            due_day_of_month: input.due_day_of_month,
            balance,
            balance_as_of: None,
            active: true,
            closed_at: None,
            created_at: now,
        })
    }

    /// Apply a metadata edit. The category cannot change.
    pub fn update(&mut self, changes: AccountChanges) -> DomainResult<()> {
        self.ensure_active()?;

        if let Some(account_type) = changes.account_type {
            if account_type.category() != self.category() {
                return Err(DomainError::invalid_operation(format!(
                    "cannot change a {} account into a {account_type} account",
                    self.account_type
                )));
            }
        }
        if let Some(last_four) = &changes.last_four {
            validate_last_four(last_four)?;
        }
        if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("account name must not be empty"));
        }
        validate_day(changes.statement_day_of_month)?;
        validate_day(changes.due_day_of_month)?;
        if let Some(limit) = changes.credit_limit {
            let AccountBalance::Liability {
                current_outstanding,
                credit_limit,
            } = &mut self.balance
            else {
                return Err(DomainError::validation(
                    "credit limit only applies to liability accounts",
                ));
            };
            non_negative("credit limit", Some(limit))?;
            let outstanding = current_outstanding.unwrap_or(Decimal::ZERO);
            if outstanding > limit {
                return Err(DomainError::validation(format!(
                    "outstanding {outstanding} exceeds credit limit {limit}"
                )));
            }
            *credit_limit = Some(limit);
        }

        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(account_type) = changes.account_type {
            self.account_type = account_type;
        }
        if let Some(last_four) = changes.last_four {
            self.last_four = last_four;
        }
        if let Some(currency) = changes.currency {
            self.currency = currency;
        }
        if changes.opening_date.is_some() {
            self.opening_date = changes.opening_date;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }
        if changes.statement_day_of_month.is_some() {
            self.statement_day_of_month = changes.statement_day_of_month;
        }
        if changes.due_day_of_month.is_some() {
            self.due_day_of_month = changes.due_day_of_month;
        }
        Ok(())
    }

    /// Soft close. Accounts are never removed.
    pub fn close(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.active = false;
        self.closed_at = Some(now);
        Ok(())
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(DomainError::AccountNotFound(self.id))
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn category(&self) -> AccountCategory {
        self.balance.category()
    }

    pub fn last_four(&self) -> &str {
        &self.last_four
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn opening_date(&self) -> Option<NaiveDate> {
        self.opening_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn statement_day_of_month(&self) -> Option<u8> {
        self.statement_day_of_month
    }

    pub fn due_day_of_month(&self) -> Option<u8> {
        self.due_day_of_month
    }

    pub fn balance(&self) -> &AccountBalance {
        &self.balance
    }

    pub fn effective_balance(&self) -> Money {
        self.balance.effective()
    }

    pub fn balance_as_of(&self) -> Option<DateTime<Utc>> {
        self.balance_as_of
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_last_four(value: &str) -> DomainResult<()> {
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(DomainError::validation("last four must be exactly 4 digits"))
    }
}

fn validate_day(day: Option<u8>) -> DomainResult<()> {
    match day {
        Some(d) if !(1..=31).contains(&d) => Err(DomainError::validation(format!(
            "day of month must be between 1 and 31 (got {d})"
        ))),
        _ => Ok(()),
    }
}

fn non_negative(field: &str, value: Option<Money>) -> DomainResult<()> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(DomainError::validation(
            format!("{field} must not be negative (got {v})"),
        )),
        _ => Ok(()),
    }
}
