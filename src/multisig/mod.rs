//! Multi-signature approval wallets
//!
//! A set of owners jointly controls a wallet: any owner may propose a
//! transaction, and it can only be executed once at least `threshold`
//! distinct owners have confirmed it. Execution happens at most once.
//!
//! # Example
//!
//! ```
//! use multisig_wallet::multisig::{Address, MultisigWallet, NoopExecutor};
//!
//! let a = Address::derive(b"alice");
//! let b = Address::derive(b"bob");
//! let c = Address::derive(b"carol");
//!
//! // 2-of-3 wallet
//! let mut wallet = MultisigWallet::with_owners(vec![a, b, c], 2).unwrap();
//!
//! let tx_id = wallet.propose(&a, Address::derive(b"shop"), 10, vec![]).unwrap();
//! wallet.confirm(&a, tx_id).unwrap();
//! wallet.confirm(&b, tx_id).unwrap();
//! wallet.execute(&c, tx_id, &mut NoopExecutor).unwrap();
//!
//! assert!(wallet.transaction(tx_id).unwrap().executed);
//! ```

pub mod address;
pub mod event;
pub mod executor;
pub mod manager;
pub mod shared;
pub mod transaction;
pub mod wallet;

pub use address::{Address, AddressError};
pub use event::{EventKind, WalletEvent};
pub use executor::{Action, ActionError, ActionExecutor, Ledger, NoopExecutor};
pub use manager::MultisigManager;
pub use shared::SharedWallet;
pub use transaction::{parse_hex_data, Confirmation, Transaction, TxStatus};
pub use wallet::{MultisigError, MultisigWallet, WalletConfig};
