//! Side effects performed when a transaction executes
//!
//! The wallet marks a transaction executed before handing it to an
//! [`ActionExecutor`], so whatever happens here can never run twice for
//! the same transaction.

use crate::multisig::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by an action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u128, need: u128 },
    #[error("Balance overflow crediting {0}")]
    BalanceOverflow(Address),
    #[error("Action rejected: {0}")]
    Rejected(String),
}

/// The action represented by a transaction
#[derive(Debug, Clone, Copy)]
pub struct Action<'a> {
    /// Wallet the action is performed on behalf of
    pub wallet: Address,
    pub tx_id: u64,
    pub to: Address,
    pub value: u128,
    pub data: &'a [u8],
}

/// Performs the action of an executed transaction
pub trait ActionExecutor {
    fn perform(&mut self, action: &Action<'_>) -> Result<(), ActionError>;
}

impl<E: ActionExecutor + ?Sized> ActionExecutor for &mut E {
    fn perform(&mut self, action: &Action<'_>) -> Result<(), ActionError> {
        (**self).perform(action)
    }
}

impl<E: ActionExecutor + ?Sized> ActionExecutor for Box<E> {
    fn perform(&mut self, action: &Action<'_>) -> Result<(), ActionError> {
        (**self).perform(action)
    }
}

/// Executor that accepts every action and does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl ActionExecutor for NoopExecutor {
    fn perform(&mut self, _action: &Action<'_>) -> Result<(), ActionError> {
        Ok(())
    }
}

/// In-memory fund book
///
/// Executing a transaction moves `value` from the wallet to the target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    balances: BTreeMap<Address, u128>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance held by an address
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Add funds to an address, returning the new balance
    pub fn credit(&mut self, address: &Address, amount: u128) -> Result<u128, ActionError> {
        let balance = self
            .balance_of(address)
            .checked_add(amount)
            .ok_or(ActionError::BalanceOverflow(*address))?;
        self.balances.insert(*address, balance);
        Ok(balance)
    }

    /// Move funds between two addresses.
    ///
    /// Either both balances change or neither does.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), ActionError> {
        let have = self.balance_of(from);
        if have < amount {
            return Err(ActionError::InsufficientFunds { have, need: amount });
        }
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ActionError::BalanceOverflow(*to))?;

        self.balances.insert(*from, have - amount);
        self.balances.insert(*to, credited);
        Ok(())
    }

    /// Addresses with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter().filter(|(_, &b)| b > 0)
    }
}

impl ActionExecutor for Ledger {
    fn perform(&mut self, action: &Action<'_>) -> Result<(), ActionError> {
        self.transfer(&action.wallet, &action.to, action.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(wallet: Address, to: Address, value: u128) -> Action<'static> {
        Action {
            wallet,
            tx_id: 0,
            to,
            value,
            data: &[],
        }
    }

    #[test]
    fn test_noop_accepts_everything() {
        let mut noop = NoopExecutor;
        let a = Address::derive(b"a");
        assert!(noop.perform(&action(a, a, u128::MAX)).is_ok());
    }

    #[test]
    fn test_ledger_transfer() {
        let wallet = Address::derive(b"wallet");
        let bob = Address::derive(b"bob");
        let mut ledger = Ledger::new();

        assert_eq!(ledger.credit(&wallet, 100).unwrap(), 100);
        ledger.perform(&action(wallet, bob, 30)).unwrap();

        assert_eq!(ledger.balance_of(&wallet), 70);
        assert_eq!(ledger.balance_of(&bob), 30);
        assert_eq!(ledger.holders().count(), 2);
    }

    #[test]
    fn test_ledger_insufficient_funds() {
        let wallet = Address::derive(b"wallet");
        let bob = Address::derive(b"bob");
        let mut ledger = Ledger::new();
        ledger.credit(&wallet, 10).unwrap();

        let result = ledger.perform(&action(wallet, bob, 11));
        assert_eq!(
            result,
            Err(ActionError::InsufficientFunds { have: 10, need: 11 })
        );

        // Nothing moved
        assert_eq!(ledger.balance_of(&wallet), 10);
        assert_eq!(ledger.balance_of(&bob), 0);
    }

    #[test]
    fn test_ledger_overflow() {
        let wallet = Address::derive(b"wallet");
        let mut ledger = Ledger::new();
        ledger.credit(&wallet, u128::MAX).unwrap();
        assert_eq!(
            ledger.credit(&wallet, 1),
            Err(ActionError::BalanceOverflow(wallet))
        );
        assert_eq!(ledger.balance_of(&wallet), u128::MAX);
    }

    #[test]
    fn test_executor_through_mut_ref() {
        let wallet = Address::derive(b"wallet");
        let bob = Address::derive(b"bob");
        let mut ledger = Ledger::new();
        ledger.credit(&wallet, 5).unwrap();

        fn run<E: ActionExecutor>(mut executor: E, action: &Action<'_>) -> Result<(), ActionError> {
            executor.perform(action)
        }

        run(&mut ledger, &action(wallet, bob, 5)).unwrap();
        assert_eq!(ledger.balance_of(&bob), 5);
    }
}
