//! Shared builders for infra tests.

use chrono::Utc;
use rust_decimal::Decimal;

use fintrack_accounts::{Account, AccountType, NewAccount};
use fintrack_core::{AccountId, Amount, UserId};
use fintrack_transactions::{NewTransaction, TransactionDetails, TransactionSource, TransactionType};

pub(crate) fn bank(starting: Decimal) -> Account {
    bank_for(None, "1234", starting)
}

pub(crate) fn bank_for(user_id: Option<UserId>, last_four: &str, starting: Decimal) -> Account {
    Account::open(
        NewAccount {
            user_id,
            name: "Checking".into(),
            account_type: Some(AccountType::Bank),
            last_four: last_four.into(),
            currency: "USD".into(),
            starting_balance: Some(starting),
            ..NewAccount::default()
        },
        Utc::now(),
    )
    .unwrap()
}

pub(crate) fn credit_card(outstanding: Decimal, limit: Decimal) -> Account {
    Account::open(
        NewAccount {
            name: "Visa".into(),
            account_type: Some(AccountType::CreditCard),
            last_four: "9876".into(),
            currency: "USD".into(),
            current_outstanding: Some(outstanding),
            credit_limit: Some(limit),
            ..NewAccount::default()
        },
        Utc::now(),
    )
    .unwrap()
}

pub(crate) fn new_txn(account: AccountId, amount: Decimal, kind: TransactionType) -> NewTransaction {
    NewTransaction {
        amount: Amount::positive(amount).unwrap(),
        kind,
        account,
        user_id: None,
        source: TransactionSource::Manual,
        details: TransactionDetails {
            name: "Groceries".into(),
            ..TransactionDetails::default()
        },
    }
}
