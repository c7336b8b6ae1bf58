//! Accounts domain (balances and their invariants).
//!
//! Pure domain logic only: no IO, no locking, no persistence concerns. The
//! infra crate owns the row lock and decides when a planned mutation commits.

pub mod account;
pub mod events;
pub mod net_worth;
pub mod rules;
pub mod snapshot;

pub use account::{
    Account, AccountBalance, AccountCategory, AccountChanges, AccountType, NewAccount,
};
pub use events::BalanceChanged;
pub use net_worth::{CategoryTotal, NetWorthSummary};
pub use rules::{AppliedEffect, BalanceMutationRequest, plan_mutation};
pub use snapshot::AccountSnapshot;
