use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fintrack_core::Money;

use crate::account::{Account, AccountCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub total: Money,
    pub count: usize,
}

/// Assets minus liabilities over a user's active accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetWorthSummary {
    pub assets: CategoryTotal,
    pub liabilities: CategoryTotal,
    pub net_worth: Money,
}

impl NetWorthSummary {
    /// Closed accounts are skipped.
    pub fn from_accounts<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut summary = Self::default();
        for account in accounts.into_iter().filter(|a| a.is_active()) {
            let bucket = match account.category() {
                AccountCategory::Asset => &mut summary.assets,
                AccountCategory::Liability => &mut summary.liabilities,
            };
            bucket.total += account.effective_balance();
            bucket.count += 1;
        }
        summary.net_worth = summary.assets.total - summary.liabilities.total;
        summary
    }

    pub fn is_positive(&self) -> bool {
        self.net_worth > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tests::{bank, credit_card};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn sums_active_accounts_by_category() {
        let checking = bank(Some(dec!(1500)));
        let savings = bank(Some(dec!(500)));
        let card = credit_card(Some(dec!(300)), Some(dec!(1000)));
        let mut closed = bank(Some(dec!(9999)));
        closed.close(Utc::now()).unwrap();

        let summary = NetWorthSummary::from_accounts([&checking, &savings, &card, &closed]);

        assert_eq!(summary.assets, CategoryTotal { total: dec!(2000), count: 2 });
        assert_eq!(summary.liabilities, CategoryTotal { total: dec!(300), count: 1 });
        assert_eq!(summary.net_worth, dec!(1700));
        assert!(summary.is_positive());
    }

    #[test]
    fn no_accounts_is_zero() {
        let summary = NetWorthSummary::from_accounts(std::iter::empty());
        assert_eq!(summary.net_worth, dec!(0));
        assert_eq!(summary.assets.count, 0);
        assert!(!summary.is_positive());
    }
}
