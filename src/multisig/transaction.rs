//! Proposed wallet transactions
//!
//! Tracks the confirmations an owner-submitted transaction has collected
//! and whether it has been executed.

use crate::multisig::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single owner's approval of a transaction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Confirmation {
    /// Confirming owner
    pub owner: Address,
    /// When the confirmation was recorded
    pub confirmed_at: DateTime<Utc>,
}

/// Where a transaction stands relative to the wallet threshold
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TxStatus {
    /// Fewer confirmations than required
    Pending,
    /// Enough confirmations, not yet executed
    Ready,
    /// Executed; terminal
    Executed,
}

/// A transaction proposed by one of the wallet owners
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequential index within the wallet
    pub id: u64,
    /// Destination of the action
    pub to: Address,
    /// Amount to transfer
    pub value: u128,
    /// Opaque payload, hex-encoded in JSON
    #[serde(with = "hex_data")]
    pub data: Vec<u8>,
    /// Set once, never cleared
    pub executed: bool,
    /// Owners who currently confirm this transaction, in confirmation order
    confirmations: Vec<Confirmation>,
    /// Owner who proposed the transaction
    pub proposer: Address,
    pub proposed_at: DateTime<Utc>,
    pub executed_by: Option<Address>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub(crate) fn new(id: u64, proposer: Address, to: Address, value: u128, data: Vec<u8>) -> Self {
        Self {
            id,
            to,
            value,
            data,
            executed: false,
            confirmations: Vec::new(),
            proposer,
            proposed_at: Utc::now(),
            executed_by: None,
            executed_at: None,
        }
    }

    /// Number of owners currently confirming
    pub fn num_confirmations(&self) -> usize {
        self.confirmations.len()
    }

    /// Check whether an owner has confirmed
    pub fn is_confirmed_by(&self, owner: &Address) -> bool {
        self.confirmations.iter().any(|c| &c.owner == owner)
    }

    /// Confirmation records in the order they were made
    pub fn confirmations(&self) -> &[Confirmation] {
        &self.confirmations
    }

    /// Owners who have confirmed
    pub fn confirmed_by(&self) -> Vec<Address> {
        self.confirmations.iter().map(|c| c.owner).collect()
    }

    /// Status against a threshold
    pub fn status(&self, threshold: usize) -> TxStatus {
        if self.executed {
            TxStatus::Executed
        } else if self.num_confirmations() >= threshold {
            TxStatus::Ready
        } else {
            TxStatus::Pending
        }
    }

    /// Record a confirmation; the caller has already checked it is new
    pub(crate) fn add_confirmation(&mut self, owner: Address) {
        debug_assert!(!self.is_confirmed_by(&owner));
        self.confirmations.push(Confirmation {
            owner,
            confirmed_at: Utc::now(),
        });
    }

    /// Drop an owner's confirmation; returns false if there was none
    pub(crate) fn remove_confirmation(&mut self, owner: &Address) -> bool {
        let before = self.confirmations.len();
        self.confirmations.retain(|c| &c.owner != owner);
        self.confirmations.len() != before
    }

    pub(crate) fn mark_executed(&mut self, by: Address) {
        self.executed = true;
        self.executed_by = Some(by);
        self.executed_at = Some(Utc::now());
    }
}

/// Serde adapter storing bytes as `0x`-prefixed hex
pub(crate) mod hex_data {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hex_data(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse a hex payload, with or without `0x` prefix. Empty input is an empty payload.
pub fn parse_hex_data(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::new(
            0,
            Address::derive(b"proposer"),
            Address::derive(b"recipient"),
            10,
            vec![0xde, 0xad],
        )
    }

    #[test]
    fn test_new_transaction() {
        let tx = sample_tx();
        assert_eq!(tx.id, 0);
        assert!(!tx.executed);
        assert_eq!(tx.num_confirmations(), 0);
        assert!(tx.confirmed_by().is_empty());
        assert_eq!(tx.status(1), TxStatus::Pending);
    }

    #[test]
    fn test_confirmation_accounting() {
        let mut tx = sample_tx();
        let a = Address::derive(b"a");
        let b = Address::derive(b"b");

        tx.add_confirmation(a);
        tx.add_confirmation(b);
        assert_eq!(tx.num_confirmations(), 2);
        assert_eq!(tx.confirmed_by(), vec![a, b]);
        assert_eq!(tx.status(2), TxStatus::Ready);

        assert!(tx.remove_confirmation(&a));
        assert!(!tx.remove_confirmation(&a));
        assert_eq!(tx.num_confirmations(), 1);
        assert!(!tx.is_confirmed_by(&a));
        assert!(tx.is_confirmed_by(&b));
        assert_eq!(tx.status(2), TxStatus::Pending);
    }

    #[test]
    fn test_executed_status_wins() {
        let mut tx = sample_tx();
        let a = Address::derive(b"a");
        tx.add_confirmation(a);
        tx.mark_executed(a);

        assert_eq!(tx.status(1), TxStatus::Executed);
        assert_eq!(tx.executed_by, Some(a));
        assert!(tx.executed_at.is_some());
    }

    #[test]
    fn test_data_serialized_as_hex() {
        let tx = sample_tx();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["data"], "0xdead");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, vec![0xde, 0xad]);
    }

    #[test]
    fn test_parse_hex_data() {
        assert_eq!(parse_hex_data("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_data("0xff00").unwrap(), vec![0xff, 0x00]);
        assert!(parse_hex_data("0xf").is_err());
    }
}
