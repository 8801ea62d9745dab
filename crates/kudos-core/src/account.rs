//! Point accounts.
//!
//! An account carries the derived balance alongside lifetime totals so that
//! `current_balance == total_earned - total_redeemed` can be checked at any
//! time. Accounts are only mutated through the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardsError};
use crate::AccountId;

/// A participant's point account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The participant's id.
    pub id: AccountId,

    /// Spendable points. Never negative.
    pub current_balance: i64,

    /// Lifetime points credited (earned and refunded).
    pub total_earned: i64,

    /// Lifetime points debited.
    pub total_redeemed: i64,

    /// When the account was provisioned.
    pub created_at: DateTime<Utc>,

    /// When the balance last changed.
    pub last_updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            id,
            current_balance: 0,
            total_earned: 0,
            total_redeemed: 0,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Check if the account can cover a debit.
    #[must_use]
    pub fn has_sufficient_balance(&self, amount: i64) -> bool {
        self.current_balance >= amount
    }

    /// Add points and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidAmount` and leaves the account
    /// untouched if the balance or lifetime total would overflow.
    pub fn apply_credit(&mut self, amount: i64) -> Result<i64> {
        let (Some(balance), Some(earned)) = (
            self.current_balance.checked_add(amount),
            self.total_earned.checked_add(amount),
        ) else {
            return Err(RewardsError::InvalidAmount(format!(
                "crediting {amount} points to {} overflows",
                self.id
            )));
        };
        self.current_balance = balance;
        self.total_earned = earned;
        self.last_updated_at = Utc::now();
        Ok(balance)
    }

    /// Remove points and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InsufficientBalance` and leaves the account
    /// untouched if the balance is lower than `amount`.
    pub fn apply_debit(&mut self, amount: i64) -> Result<i64> {
        if !self.has_sufficient_balance(amount) {
            return Err(RewardsError::InsufficientBalance {
                balance: self.current_balance,
                required: amount,
            });
        }
        self.current_balance -= amount;
        self.total_redeemed += amount;
        self.last_updated_at = Utc::now();
        Ok(self.current_balance)
    }

    /// Check the balance identity and non-negativity.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.current_balance >= 0
            && self.total_earned >= 0
            && self.total_redeemed >= 0
            && self.current_balance == self.total_earned - self.total_redeemed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_zero_balance() {
        let account = Account::new(AccountId::generate());
        assert_eq!(account.current_balance, 0);
        assert_eq!(account.total_earned, 0);
        assert_eq!(account.total_redeemed, 0);
        assert!(account.is_consistent());
    }

    #[test]
    fn credit_then_debit_keeps_identity() {
        let mut account = Account::new(AccountId::generate());
        assert_eq!(account.apply_credit(1000).unwrap(), 1000);
        assert_eq!(account.apply_debit(300).unwrap(), 700);

        assert_eq!(account.total_earned, 1000);
        assert_eq!(account.total_redeemed, 300);
        assert!(account.is_consistent());
    }

    #[test]
    fn debit_beyond_balance_is_rejected_without_mutation() {
        let mut account = Account::new(AccountId::generate());
        account.apply_credit(100).unwrap();
        let before = account.clone();

        let err = account.apply_debit(101).unwrap_err();
        assert!(matches!(
            err,
            RewardsError::InsufficientBalance {
                balance: 100,
                required: 101
            }
        ));
        assert_eq!(account, before);
    }

    #[test]
    fn debit_of_exact_balance_reaches_zero() {
        let mut account = Account::new(AccountId::generate());
        account.apply_credit(250).unwrap();
        assert_eq!(account.apply_debit(250).unwrap(), 0);
        assert!(account.is_consistent());
    }

    #[test]
    fn credit_overflow_is_rejected_without_mutation() {
        let mut account = Account::new(AccountId::generate());
        account.apply_credit(1).unwrap();
        let before = account.clone();

        let err = account.apply_credit(i64::MAX).unwrap_err();
        assert!(matches!(err, RewardsError::InvalidAmount(_)));
        assert_eq!(account, before);
    }
}
