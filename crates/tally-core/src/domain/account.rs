//! Account - 永続化された残高

use serde::{Deserialize, Serialize};

use super::errors::LedgerError;
use super::ids::AccountId;

/// A persisted account row.
///
/// `version` is the optimistic concurrency token: a store accepts an update only when the
/// stored version still equals the one the caller read, then bumps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: i64,
    pub version: u64,
}

impl Account {
    pub fn new(id: AccountId, balance: i64) -> Self {
        Self {
            id,
            balance,
            version: 0,
        }
    }

    /// Adds funds. Fails on a non-positive amount or an i64 overflow.
    pub fn credit(&mut self, amount: i64) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                account_id: self.id,
                balance: self.balance,
                amount,
            })?;
        Ok(())
    }

    /// Removes funds if the balance covers them; otherwise the balance is left untouched.
    pub fn debit(&mut self, amount: i64) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account_id: self.id,
                balance: self.balance,
                requested: amount,
            });
        }
        // 0 < amount <= balance なので結果は 0 以上
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account_id: self.id,
                balance: self.balance,
                requested: amount,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_adds_amount() {
        let mut account = Account::new(AccountId::random(), 50);
        account.credit(100).unwrap();
        assert_eq!(account.balance, 150);
    }

    #[test]
    fn credit_overflow_is_rejected() {
        let mut account = Account::new(AccountId::random(), i64::MAX - 1);
        let result = account.credit(2);
        assert!(matches!(result, Err(LedgerError::BalanceOverflow { .. })));
        assert_eq!(account.balance, i64::MAX - 1);
    }

    #[test]
    fn debit_within_balance() {
        let mut account = Account::new(AccountId::random(), 50);
        account.debit(50).unwrap();
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn debit_insufficient_leaves_balance() {
        let mut account = Account::new(AccountId::random(), 50);
        let result = account.debit(200);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                balance: 50,
                requested: 200,
                ..
            })
        ));
        assert_eq!(account.balance, 50);
    }

    #[test]
    fn non_positive_amounts_never_move_the_balance() {
        let mut account = Account::new(AccountId::random(), 50);

        for amount in [0, -100, i64::MIN] {
            assert!(matches!(
                account.credit(amount),
                Err(LedgerError::InvalidAmount(a)) if a == amount
            ));
            assert!(matches!(
                account.debit(amount),
                Err(LedgerError::InvalidAmount(a)) if a == amount
            ));
        }
        assert_eq!(account.balance, 50);
    }
}
