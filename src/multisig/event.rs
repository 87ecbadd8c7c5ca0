//! Wallet audit events
//!
//! Every successful state change on a wallet appends one event.

use crate::multisig::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Funds were sent to the wallet
    Deposit {
        sender: Address,
        amount: u128,
        balance: u128,
    },
    /// An owner proposed a transaction
    SubmitTransaction {
        owner: Address,
        tx_id: u64,
        to: Address,
        value: u128,
    },
    /// An owner confirmed a transaction
    ConfirmTransaction { owner: Address, tx_id: u64 },
    /// An owner withdrew a confirmation
    RevokeConfirmation { owner: Address, tx_id: u64 },
    /// A transaction was marked executed
    ExecuteTransaction { owner: Address, tx_id: u64 },
    /// The action of an executed transaction failed
    ExecutionFailed { tx_id: u64, reason: String },
}

/// An event together with its position in the wallet log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletEvent {
    /// Position in the log, starting at 0
    pub seq: u64,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl WalletEvent {
    pub fn new(seq: u64, kind: EventKind) -> Self {
        Self {
            seq,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Transaction this event refers to, if any
    pub fn tx_id(&self) -> Option<u64> {
        match &self.kind {
            EventKind::Deposit { .. } => None,
            EventKind::SubmitTransaction { tx_id, .. }
            | EventKind::ConfirmTransaction { tx_id, .. }
            | EventKind::RevokeConfirmation { tx_id, .. }
            | EventKind::ExecuteTransaction { tx_id, .. }
            | EventKind::ExecutionFailed { tx_id, .. } => Some(*tx_id),
        }
    }
}
