//! Multisig Wallet: multi-signature approval wallets in Rust
//!
//! This crate provides:
//! - An M-of-N approval engine with explicit caller identity
//! - Propose, confirm, revoke and execute with at-most-once execution
//! - Pluggable effects run after a transaction is marked executed
//! - A thread-safe wallet handle that serializes all operations
//! - A registry of deployed wallets with JSON persistence and backups
//! - A CLI and a REST API over the registry
//!
//! # Example
//!
//! ```rust
//! use multisig_wallet::multisig::{Address, MultisigManager, WalletConfig};
//!
//! let owners: Vec<Address> = ["alice", "bob", "carol"]
//!     .iter()
//!     .map(|name| Address::derive(name.as_bytes()))
//!     .collect();
//!
//! let mut manager = MultisigManager::new();
//! let config = WalletConfig::new(owners.clone(), 2, None).unwrap();
//! let wallet = manager.deploy(&owners[0], config).unwrap();
//! manager.deposit(&wallet, &owners[0], 100).unwrap();
//!
//! let shop = Address::derive(b"shop");
//! let tx_id = manager.propose(&wallet, &owners[0], shop, 40, vec![]).unwrap().id;
//! manager.confirm(&wallet, &owners[0], tx_id).unwrap();
//! manager.confirm(&wallet, &owners[1], tx_id).unwrap();
//! manager.execute(&wallet, &owners[2], tx_id).unwrap();
//!
//! assert_eq!(manager.balance(&wallet), 60);
//! assert_eq!(manager.balance(&shop), 40);
//! ```

pub mod api;
pub mod cli;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use multisig::{
    Address, ActionExecutor, Ledger, MultisigError, MultisigManager, MultisigWallet,
    SharedWallet, Transaction, WalletConfig,
};
pub use storage::{DeploymentRecord, Storage, StorageConfig};
