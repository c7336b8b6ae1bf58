//! `fintrack-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error taxonomy, and money helpers shared by the
//! accounts and transactions crates.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, ReconciliationId, SnapshotId, TransactionId, UserId};
pub use money::{Amount, Money};
