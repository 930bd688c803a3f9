//! Account and buying power.
//!
//! An account is one cash balance per user. The settlement engine is the only
//! writer; the `version` counter is bumped by the store on every commit so a
//! stale snapshot can never be written back.

use crate::types::{AccountId, Quote, Timestamp};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Starting cash for every new or reset account.
pub const INITIAL_BUYING_POWER: Quote = Quote::new(dec!(100000));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub buying_power: Quote,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: u64,
}

impl Account {
    pub fn new(id: AccountId, initial_buying_power: Quote, timestamp: Timestamp) -> Self {
        Self {
            id,
            buying_power: initial_buying_power,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    pub fn can_afford(&self, cost: Quote) -> bool {
        self.buying_power >= cost
    }

    /// Balance after paying `cost`, or the shortfall error. Does not mutate.
    pub fn debited(&self, cost: Quote) -> Result<Quote, AccountError> {
        if !self.can_afford(cost) {
            return Err(AccountError::InsufficientBuyingPower {
                required: cost,
                available: self.buying_power,
            });
        }
        Ok(self.buying_power.sub(cost))
    }

    /// Balance after receiving `amount`. `None` if it would pass `Decimal::MAX`.
    pub fn credited(&self, amount: Quote) -> Option<Quote> {
        self.buying_power.checked_add(amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient buying power: required {required}, available {available}")]
    InsufficientBuyingPower { required: Quote, available: Quote },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_account() -> Account {
        Account::new(AccountId::new("acct-1"), Quote::new(dec!(1000)), Timestamp::from_millis(0))
    }

    #[test]
    fn new_account_starts_at_version_zero() {
        let account = test_account();
        assert_eq!(account.version, 0);
        assert_eq!(account.buying_power.value(), dec!(1000));
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn debit_within_balance() {
        let account = test_account();
        assert_eq!(account.debited(Quote::new(dec!(400))).unwrap().value(), dec!(600));
        // exact spend down to zero is allowed
        assert_eq!(account.debited(Quote::new(dec!(1000))).unwrap().value(), dec!(0));
    }

    #[test]
    fn debit_beyond_balance() {
        let account = test_account();
        let err = account.debited(Quote::new(dec!(1000.01))).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientBuyingPower { .. }));
        // nothing changed
        assert_eq!(account.buying_power.value(), dec!(1000));
    }

    #[test]
    fn credit_adds() {
        let account = test_account();
        assert_eq!(account.credited(Quote::new(dec!(25.5))).unwrap().value(), dec!(1025.5));
    }

    #[test]
    fn credit_past_max_is_refused() {
        let account = Account::new(
            AccountId::new("acct-2"),
            Quote::new(rust_decimal::Decimal::MAX),
            Timestamp::from_millis(0),
        );
        assert_eq!(account.credited(Quote::new(dec!(1))), None);
    }

    #[test]
    fn initial_constant() {
        assert_eq!(INITIAL_BUYING_POWER.value(), dec!(100000));
    }
}
