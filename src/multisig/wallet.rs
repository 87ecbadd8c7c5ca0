//! Multi-signature wallet implementation
//!
//! A fixed set of owners proposes transactions; each needs confirmations
//! from at least `threshold` distinct owners before any owner can execute it.

use crate::multisig::address::Address;
use crate::multisig::event::{EventKind, WalletEvent};
use crate::multisig::executor::{Action, ActionError, ActionExecutor};
use crate::multisig::transaction::{Transaction, TxStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors related to multisig operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Caller is not an owner: {0}")]
    Unauthorized(Address),
    #[error("Transaction not found: {0}")]
    NotFound(u64),
    #[error("Transaction {0} already executed")]
    AlreadyExecuted(u64),
    #[error("Transaction {tx_id} already confirmed by {owner}")]
    AlreadyConfirmed { tx_id: u64, owner: Address },
    #[error("Transaction {tx_id} not confirmed by {owner}")]
    NotConfirmed { tx_id: u64, owner: Address },
    #[error("Insufficient confirmations: have {have}, need {need}")]
    InsufficientConfirmations { have: usize, need: usize },
    #[error("Transaction {tx_id} executed but its action failed: {source}")]
    ActionFailed { tx_id: u64, source: ActionError },
    #[error("Deposit failed: {0}")]
    DepositFailed(ActionError),
    #[error("Wallet not found: {0}")]
    WalletNotFound(Address),
    #[error("Inconsistent wallet state: {0}")]
    CorruptState(String),
}

/// Owners and quorum of a wallet, fixed at construction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawWalletConfig")]
pub struct WalletConfig {
    /// Owners in the order they were given
    owners: Vec<Address>,
    /// Confirmations required to execute
    threshold: usize,
    /// Optional human-readable label
    pub label: Option<String>,
}

/// Unvalidated form used when reading a config from disk
#[derive(Deserialize)]
struct RawWalletConfig {
    owners: Vec<Address>,
    threshold: usize,
    label: Option<String>,
}

impl TryFrom<RawWalletConfig> for WalletConfig {
    type Error = MultisigError;

    fn try_from(raw: RawWalletConfig) -> Result<Self, Self::Error> {
        WalletConfig::new(raw.owners, raw.threshold, raw.label)
    }
}

impl WalletConfig {
    /// Create a validated configuration
    ///
    /// # Errors
    /// `InvalidConfiguration` if the owner list is empty, contains the zero
    /// address or a duplicate, or the threshold is outside `1..=owners.len()`.
    pub fn new(
        owners: Vec<Address>,
        threshold: usize,
        label: Option<String>,
    ) -> Result<Self, MultisigError> {
        if owners.is_empty() {
            return Err(MultisigError::InvalidConfiguration(
                "owners required".to_string(),
            ));
        }

        if threshold == 0 || threshold > owners.len() {
            return Err(MultisigError::InvalidConfiguration(format!(
                "threshold {} must be between 1 and {}",
                threshold,
                owners.len()
            )));
        }

        if owners.iter().any(Address::is_zero) {
            return Err(MultisigError::InvalidConfiguration(
                "zero address cannot be an owner".to_string(),
            ));
        }

        let mut sorted = owners.clone();
        sorted.sort();
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(MultisigError::InvalidConfiguration(format!(
                "duplicate owner {}",
                pair[0]
            )));
        }

        Ok(Self {
            owners,
            threshold,
            label,
        })
    }

    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_owner(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }

    /// Description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.owners.len())
    }

    /// Address derived from the threshold and the sorted owner set
    fn derived_address(&self) -> Address {
        let mut sorted = self.owners.clone();
        sorted.sort();

        let mut seed = (self.threshold as u64).to_be_bytes().to_vec();
        for owner in &sorted {
            seed.extend_from_slice(owner.as_bytes());
        }
        Address::derive(&seed)
    }
}

/// A multi-signature wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultisigWallet {
    /// Wallet identity
    address: Address,
    config: WalletConfig,
    /// All transactions ever proposed, indexed by id
    transactions: Vec<Transaction>,
    /// Audit log
    events: Vec<WalletEvent>,
    pub created_at: DateTime<Utc>,
}

impl MultisigWallet {
    /// Create a wallet whose address is derived from its configuration
    pub fn new(config: WalletConfig) -> Self {
        let address = config.derived_address();
        Self::deploy(address, config)
    }

    /// Create a wallet at a given address
    pub fn deploy(address: Address, config: WalletConfig) -> Self {
        Self {
            address,
            config,
            transactions: Vec::new(),
            events: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Validate owners and threshold and build a wallet in one step
    pub fn with_owners(owners: Vec<Address>, threshold: usize) -> Result<Self, MultisigError> {
        Ok(Self::new(WalletConfig::new(owners, threshold, None)?))
    }

    // =========================================================================
    // Read operations
    // =========================================================================

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn owners(&self) -> &[Address] {
        self.config.owners()
    }

    pub fn threshold(&self) -> usize {
        self.config.threshold()
    }

    pub fn is_owner(&self, address: &Address) -> bool {
        self.config.is_owner(address)
    }

    pub fn description(&self) -> String {
        self.config.description()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Get a transaction by id
    pub fn transaction(&self, tx_id: u64) -> Result<&Transaction, MultisigError> {
        usize::try_from(tx_id)
            .ok()
            .and_then(|idx| self.transactions.get(idx))
            .ok_or(MultisigError::NotFound(tx_id))
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Transactions not yet executed
    pub fn pending_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| !tx.executed)
    }

    /// Whether `owner` currently confirms `tx_id`; false for unknown transactions
    pub fn is_confirmed(&self, tx_id: u64, owner: &Address) -> bool {
        self.transaction(tx_id)
            .map(|tx| tx.is_confirmed_by(owner))
            .unwrap_or(false)
    }

    pub fn status(&self, tx_id: u64) -> Result<TxStatus, MultisigError> {
        Ok(self.transaction(tx_id)?.status(self.threshold()))
    }

    pub fn events(&self) -> &[WalletEvent] {
        &self.events
    }

    /// Check that state read from outside still satisfies the wallet rules
    ///
    /// Transaction ids must match their position, confirmations must come
    /// from distinct owners, and executed transactions must carry an
    /// executor and enough confirmations.
    pub fn validate(&self) -> Result<(), MultisigError> {
        for (idx, tx) in self.transactions.iter().enumerate() {
            if tx.id != idx as u64 {
                return Err(MultisigError::CorruptState(format!(
                    "transaction at position {} has id {}",
                    idx, tx.id
                )));
            }

            let mut seen = BTreeSet::new();
            for confirmation in tx.confirmations() {
                if !self.is_owner(&confirmation.owner) {
                    return Err(MultisigError::CorruptState(format!(
                        "transaction {} confirmed by non-owner {}",
                        tx.id, confirmation.owner
                    )));
                }
                if !seen.insert(confirmation.owner) {
                    return Err(MultisigError::CorruptState(format!(
                        "transaction {} confirmed twice by {}",
                        tx.id, confirmation.owner
                    )));
                }
            }

            match (tx.executed, tx.executed_by) {
                (false, None) => {}
                (true, Some(by)) if self.is_owner(&by) => {
                    if tx.num_confirmations() < self.threshold() {
                        return Err(MultisigError::CorruptState(format!(
                            "transaction {} executed with {} of {} confirmations",
                            tx.id,
                            tx.num_confirmations(),
                            self.threshold()
                        )));
                    }
                }
                _ => {
                    return Err(MultisigError::CorruptState(format!(
                        "transaction {} has an inconsistent execution record",
                        tx.id
                    )));
                }
            }
        }

        if let Some((idx, event)) = self
            .events
            .iter()
            .enumerate()
            .find(|(idx, event)| event.seq != *idx as u64)
        {
            return Err(MultisigError::CorruptState(format!(
                "event at position {} has sequence {}",
                idx, event.seq
            )));
        }

        Ok(())
    }

    // =========================================================================
    // Mutating operations
    // =========================================================================

    /// Record funds arriving at the wallet. Open to any sender.
    pub fn record_deposit(&mut self, sender: Address, amount: u128, balance: u128) {
        self.emit(EventKind::Deposit {
            sender,
            amount,
            balance,
        });
    }

    /// Propose a new transaction, returning its id
    pub fn propose(
        &mut self,
        caller: &Address,
        to: Address,
        value: u128,
        data: Vec<u8>,
    ) -> Result<u64, MultisigError> {
        self.ensure_owner(caller)?;

        let tx_id = self.transactions.len() as u64;
        self.transactions
            .push(Transaction::new(tx_id, *caller, to, value, data));
        self.emit(EventKind::SubmitTransaction {
            owner: *caller,
            tx_id,
            to,
            value,
        });

        Ok(tx_id)
    }

    /// Confirm a transaction
    ///
    /// Confirming twice is an error rather than a no-op.
    pub fn confirm(&mut self, caller: &Address, tx_id: u64) -> Result<(), MultisigError> {
        let idx = self.open_transaction(caller, tx_id)?;
        let tx = &mut self.transactions[idx];

        if tx.is_confirmed_by(caller) {
            return Err(MultisigError::AlreadyConfirmed {
                tx_id,
                owner: *caller,
            });
        }

        tx.add_confirmation(*caller);
        self.emit(EventKind::ConfirmTransaction {
            owner: *caller,
            tx_id,
        });
        Ok(())
    }

    /// Withdraw an earlier confirmation
    pub fn revoke(&mut self, caller: &Address, tx_id: u64) -> Result<(), MultisigError> {
        let idx = self.open_transaction(caller, tx_id)?;

        if !self.transactions[idx].remove_confirmation(caller) {
            return Err(MultisigError::NotConfirmed {
                tx_id,
                owner: *caller,
            });
        }

        self.emit(EventKind::RevokeConfirmation {
            owner: *caller,
            tx_id,
        });
        Ok(())
    }

    /// Execute a transaction that has reached the threshold
    ///
    /// The transaction is marked executed before `executor` runs. If the
    /// action fails the transaction stays executed and `ActionFailed` is
    /// returned; retrying needs a new proposal.
    pub fn execute<E: ActionExecutor + ?Sized>(
        &mut self,
        caller: &Address,
        tx_id: u64,
        executor: &mut E,
    ) -> Result<(), MultisigError> {
        let idx = self.open_transaction(caller, tx_id)?;
        let threshold = self.threshold();

        let have = self.transactions[idx].num_confirmations();
        if have < threshold {
            return Err(MultisigError::InsufficientConfirmations {
                have,
                need: threshold,
            });
        }

        self.transactions[idx].mark_executed(*caller);
        self.emit(EventKind::ExecuteTransaction {
            owner: *caller,
            tx_id,
        });

        let tx = &self.transactions[idx];
        let action = Action {
            wallet: self.address,
            tx_id,
            to: tx.to,
            value: tx.value,
            data: &tx.data,
        };

        if let Err(source) = executor.perform(&action) {
            self.emit(EventKind::ExecutionFailed {
                tx_id,
                reason: source.to_string(),
            });
            return Err(MultisigError::ActionFailed { tx_id, source });
        }

        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_owner(&self, caller: &Address) -> Result<(), MultisigError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(MultisigError::Unauthorized(*caller))
        }
    }

    /// Checks shared by confirm, revoke and execute, in order:
    /// exists, caller is owner, not executed.
    fn open_transaction(&self, caller: &Address, tx_id: u64) -> Result<usize, MultisigError> {
        let tx = self.transaction(tx_id)?;
        self.ensure_owner(caller)?;
        if tx.executed {
            return Err(MultisigError::AlreadyExecuted(tx_id));
        }
        Ok(tx_id as usize)
    }

    fn emit(&mut self, kind: EventKind) {
        let seq = self.events.len() as u64;
        self.events.push(WalletEvent::new(seq, kind));
    }
}
