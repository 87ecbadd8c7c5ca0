//! Multi-signature wallet registry
//!
//! Deploys independent wallets, routes owner operations to them and keeps
//! the fund ledger used when transactions execute.

use crate::multisig::address::Address;
use crate::multisig::executor::Ledger;
use crate::multisig::transaction::Transaction;
use crate::multisig::wallet::{MultisigError, MultisigWallet, WalletConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manager for multisig wallets and their funds
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MultisigManager {
    /// Wallets by address
    wallets: BTreeMap<Address, MultisigWallet>,
    /// Balances of wallets and recipients
    ledger: Ledger,
    /// Deployment counter for address generation
    nonce: u64,
}

impl MultisigManager {
    /// Create a new empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a new wallet and return its address
    ///
    /// Each deployment gets a fresh address, even for an owner set that
    /// already has a wallet.
    pub fn deploy(
        &mut self,
        deployer: &Address,
        config: WalletConfig,
    ) -> Result<Address, MultisigError> {
        let mut address = Address::for_deployment(deployer, self.nonce);
        self.nonce += 1;
        while self.wallets.contains_key(&address) {
            address = Address::for_deployment(deployer, self.nonce);
            self.nonce += 1;
        }

        log::info!(
            "Multisig wallet deployed: {} ({}) by {}",
            address,
            config.description(),
            deployer
        );

        self.wallets
            .insert(address, MultisigWallet::deploy(address, config));
        Ok(address)
    }

    /// Get a wallet by address
    pub fn wallet(&self, address: &Address) -> Result<&MultisigWallet, MultisigError> {
        self.wallets
            .get(address)
            .ok_or(MultisigError::WalletNotFound(*address))
    }

    fn wallet_mut(&mut self, address: &Address) -> Result<&mut MultisigWallet, MultisigError> {
        self.wallets
            .get_mut(address)
            .ok_or(MultisigError::WalletNotFound(*address))
    }

    /// List all wallets, ordered by address
    pub fn list_wallets(&self) -> Vec<&MultisigWallet> {
        self.wallets.values().collect()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_wallet(&self, address: &Address) -> bool {
        self.wallets.contains_key(address)
    }

    /// Balance held by any address
    pub fn balance(&self, address: &Address) -> u128 {
        self.ledger.balance_of(address)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Check every wallet after loading, including that each is stored
    /// under its own address
    pub fn validate(&self) -> Result<(), MultisigError> {
        for (address, wallet) in &self.wallets {
            if wallet.address() != address {
                return Err(MultisigError::CorruptState(format!(
                    "wallet {} stored under {}",
                    wallet.address(),
                    address
                )));
            }
            wallet.validate()?;
        }
        Ok(())
    }

    /// Send funds to a wallet, returning its new balance
    pub fn deposit(
        &mut self,
        wallet: &Address,
        sender: &Address,
        amount: u128,
    ) -> Result<u128, MultisigError> {
        let target = self
            .wallets
            .get_mut(wallet)
            .ok_or(MultisigError::WalletNotFound(*wallet))?;

        let balance = self
            .ledger
            .credit(wallet, amount)
            .map_err(MultisigError::DepositFailed)?;
        target.record_deposit(*sender, amount, balance);

        log::debug!("Deposit of {} to {} from {}", amount, wallet, sender);
        Ok(balance)
    }

    /// Propose a transaction from a wallet
    pub fn propose(
        &mut self,
        wallet: &Address,
        caller: &Address,
        to: Address,
        value: u128,
        data: Vec<u8>,
    ) -> Result<&Transaction, MultisigError> {
        let target = self.wallet_mut(wallet)?;
        let tx_id = target.propose(caller, to, value, data)?;

        log::info!(
            "Transaction {} proposed on {} by {}: {} to {}",
            tx_id,
            wallet,
            caller,
            value,
            to
        );

        target.transaction(tx_id)
    }

    /// Confirm a pending transaction
    pub fn confirm(
        &mut self,
        wallet: &Address,
        caller: &Address,
        tx_id: u64,
    ) -> Result<&Transaction, MultisigError> {
        let target = self.wallet_mut(wallet)?;
        target.confirm(caller, tx_id)?;

        let tx = target.transaction(tx_id)?;
        log::debug!(
            "Transaction {} on {} confirmed by {} ({}/{})",
            tx_id,
            wallet,
            caller,
            tx.num_confirmations(),
            target.threshold()
        );
        Ok(tx)
    }

    /// Revoke a confirmation
    pub fn revoke(
        &mut self,
        wallet: &Address,
        caller: &Address,
        tx_id: u64,
    ) -> Result<&Transaction, MultisigError> {
        let target = self.wallet_mut(wallet)?;
        target.revoke(caller, tx_id)?;

        log::debug!(
            "Transaction {} on {} revoked by {}",
            tx_id,
            wallet,
            caller
        );
        target.transaction(tx_id)
    }

    /// Execute a confirmed transaction against the ledger
    pub fn execute(
        &mut self,
        wallet: &Address,
        caller: &Address,
        tx_id: u64,
    ) -> Result<&Transaction, MultisigError> {
        let target = self
            .wallets
            .get_mut(wallet)
            .ok_or(MultisigError::WalletNotFound(*wallet))?;

        match target.execute(caller, tx_id, &mut self.ledger) {
            Ok(()) => {
                log::info!("Transaction {} on {} executed by {}", tx_id, wallet, caller);
            }
            Err(MultisigError::ActionFailed { tx_id, source }) => {
                log::warn!(
                    "Transaction {} on {} executed but its action failed: {}",
                    tx_id,
                    wallet,
                    source
                );
                return Err(MultisigError::ActionFailed { tx_id, source });
            }
            Err(e) => return Err(e),
        }

        target.transaction(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners() -> Vec<Address> {
        (0..3)
            .map(|i| Address::derive(format!("owner-{}", i).as_bytes()))
            .collect()
    }

    fn deployer() -> Address {
        Address::derive(b"deployer")
    }

    fn manager_with_wallet() -> (MultisigManager, Address, Vec<Address>) {
        let mut manager = MultisigManager::new();
        let config = WalletConfig::new(owners(), 2, Some("Test".to_string())).unwrap();
        let address = manager.deploy(&deployer(), config).unwrap();
        (manager, address, owners())
    }

    #[test]
    fn test_manager_creation() {
        let manager = MultisigManager::new();
        assert_eq!(manager.wallet_count(), 0);
        assert!(manager.list_wallets().is_empty());
    }

    #[test]
    fn test_deploy_gives_distinct_addresses() {
        let mut manager = MultisigManager::new();
        let config = WalletConfig::new(owners(), 2, None).unwrap();

        let first = manager.deploy(&deployer(), config.clone()).unwrap();
        let second = manager.deploy(&deployer(), config).unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.wallet_count(), 2);
        assert!(manager.is_wallet(&first));
        assert!(!manager.is_wallet(&deployer()));
        assert_eq!(manager.wallet(&first).unwrap().address(), &first);
    }

    #[test]
    fn test_unknown_wallet() {
        let (mut manager, _, o) = manager_with_wallet();
        let missing = Address::derive(b"missing");

        assert_eq!(
            manager.wallet(&missing).unwrap_err(),
            MultisigError::WalletNotFound(missing)
        );
        assert_eq!(
            manager.confirm(&missing, &o[0], 0).unwrap_err(),
            MultisigError::WalletNotFound(missing)
        );
        assert_eq!(
            manager.deposit(&missing, &o[0], 1).unwrap_err(),
            MultisigError::WalletNotFound(missing)
        );
        assert_eq!(manager.balance(&missing), 0);
    }

    #[test]
    fn test_full_flow_moves_funds() {
        let (mut manager, wallet, o) = manager_with_wallet();
        let to = Address::derive(b"recipient");
        let funder = Address::derive(b"funder");

        assert_eq!(manager.deposit(&wallet, &funder, 100).unwrap(), 100);

        let tx = manager.propose(&wallet, &o[0], to, 25, vec![]).unwrap();
        assert_eq!(tx.id, 0);

        manager.confirm(&wallet, &o[0], 0).unwrap();
        let tx = manager.confirm(&wallet, &o[1], 0).unwrap();
        assert_eq!(tx.num_confirmations(), 2);

        let tx = manager.execute(&wallet, &o[2], 0).unwrap();
        assert!(tx.executed);

        assert_eq!(manager.balance(&wallet), 75);
        assert_eq!(manager.balance(&to), 25);
        assert_eq!(manager.ledger().holders().count(), 2);
    }

    #[test]
    fn test_unfunded_execution_fails_closed() {
        let (mut manager, wallet, o) = manager_with_wallet();
        let to = Address::derive(b"recipient");

        manager.propose(&wallet, &o[0], to, 25, vec![]).unwrap();
        manager.confirm(&wallet, &o[0], 0).unwrap();
        manager.confirm(&wallet, &o[1], 0).unwrap();

        assert!(matches!(
            manager.execute(&wallet, &o[0], 0),
            Err(MultisigError::ActionFailed { tx_id: 0, .. })
        ));

        // Funding afterwards does not make the transaction executable again
        manager.deposit(&wallet, &o[0], 100).unwrap();
        assert_eq!(
            manager.execute(&wallet, &o[0], 0).unwrap_err(),
            MultisigError::AlreadyExecuted(0)
        );
        assert_eq!(manager.balance(&to), 0);
    }

    #[test]
    fn test_revoke_through_manager() {
        let (mut manager, wallet, o) = manager_with_wallet();
        manager
            .propose(&wallet, &o[0], Address::derive(b"to"), 1, vec![])
            .unwrap();
        manager.confirm(&wallet, &o[0], 0).unwrap();

        let tx = manager.revoke(&wallet, &o[0], 0).unwrap();
        assert_eq!(tx.num_confirmations(), 0);
    }

    #[test]
    fn test_wallets_are_independent() {
        let mut manager = MultisigManager::new();
        let o = owners();
        let w1 = manager
            .deploy(&deployer(), WalletConfig::new(o.clone(), 1, None).unwrap())
            .unwrap();
        let w2 = manager
            .deploy(&deployer(), WalletConfig::new(o.clone(), 2, None).unwrap())
            .unwrap();

        manager
            .propose(&w1, &o[0], Address::derive(b"to"), 0, vec![])
            .unwrap();
        manager.confirm(&w1, &o[0], 0).unwrap();

        assert_eq!(manager.wallet(&w1).unwrap().transaction_count(), 1);
        assert_eq!(manager.wallet(&w2).unwrap().transaction_count(), 0);
        assert_eq!(
            manager.confirm(&w2, &o[0], 0).unwrap_err(),
            MultisigError::NotFound(0)
        );
    }

    #[test]
    fn test_validate_checks_wallet_keys() {
        let (manager, wallet, _) = manager_with_wallet();
        assert_eq!(manager.validate(), Ok(()));

        let mut json = serde_json::to_value(&manager).unwrap();
        let entry = json["wallets"]
            .as_object_mut()
            .unwrap()
            .remove(&wallet.to_string())
            .unwrap();
        json["wallets"][Address::derive(b"elsewhere").to_string()] = entry;

        let moved: MultisigManager = serde_json::from_value(json).unwrap();
        assert!(matches!(
            moved.validate(),
            Err(MultisigError::CorruptState(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip_preserves_state() {
        let (mut manager, wallet, o) = manager_with_wallet();
        manager.deposit(&wallet, &o[0], 10).unwrap();
        manager
            .propose(&wallet, &o[0], Address::derive(b"to"), 5, vec![0xab])
            .unwrap();
        manager.confirm(&wallet, &o[1], 0).unwrap();

        let json = serde_json::to_string(&manager).unwrap();
        let restored: MultisigManager = serde_json::from_str(&json).unwrap();

        let w = restored.wallet(&wallet).unwrap();
        assert_eq!(w.transaction_count(), 1);
        assert!(w.is_confirmed(0, &o[1]));
        assert_eq!(w.transaction(0).unwrap().data, vec![0xab]);
        assert_eq!(restored.balance(&wallet), 10);
        assert_eq!(w.events().len(), 3);
    }
}
