//! Money primitives.
//!
//! Balances are plain signed decimals (`Money`); transaction amounts are an
//! unsigned-by-construction `Amount` whose direction comes from the transaction
//! type, never from its sign.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Signed monetary value (balances, deltas).
pub type Money = Decimal;

/// Non-negative transaction amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Accepts zero (an audited no-op) and any positive value.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "amount must not be negative (got {value})"
            )));
        }
        Ok(Self(value.normalize()))
    }

    /// Strictly positive amount, as required for journal rows.
    pub fn positive(value: Decimal) -> DomainResult<Self> {
        let amount = Self::new(value)?;
        if amount.is_zero() {
            return Err(DomainError::validation("amount must be positive"));
        }
        Ok(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
