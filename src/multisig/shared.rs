//! Thread-safe wallet handle
//!
//! Every operation takes one lock for its whole read-modify-write, so
//! owners acting from different threads are applied in a single order.

use crate::multisig::address::Address;
use crate::multisig::executor::ActionExecutor;
use crate::multisig::transaction::Transaction;
use crate::multisig::wallet::{MultisigError, MultisigWallet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Inner<E> {
    wallet: MultisigWallet,
    executor: E,
}

/// A wallet and its executor behind one mutex. Clones share state.
pub struct SharedWallet<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Clone for SharedWallet<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: ActionExecutor> SharedWallet<E> {
    pub fn new(wallet: MultisigWallet, executor: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { wallet, executor })),
        }
    }

    // Wallet mutations validate before touching state, so a panic in another
    // holder cannot leave a half-applied operation behind.
    fn lock(&self) -> MutexGuard<'_, Inner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn address(&self) -> Address {
        *self.lock().wallet.address()
    }

    pub fn owners(&self) -> Vec<Address> {
        self.lock().wallet.owners().to_vec()
    }

    pub fn threshold(&self) -> usize {
        self.lock().wallet.threshold()
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().wallet.transaction_count()
    }

    /// Snapshot of a transaction
    pub fn transaction(&self, tx_id: u64) -> Result<Transaction, MultisigError> {
        self.lock().wallet.transaction(tx_id).cloned()
    }

    pub fn is_confirmed(&self, tx_id: u64, owner: &Address) -> bool {
        self.lock().wallet.is_confirmed(tx_id, owner)
    }

    pub fn propose(
        &self,
        caller: &Address,
        to: Address,
        value: u128,
        data: Vec<u8>,
    ) -> Result<u64, MultisigError> {
        self.lock().wallet.propose(caller, to, value, data)
    }

    pub fn confirm(&self, caller: &Address, tx_id: u64) -> Result<(), MultisigError> {
        self.lock().wallet.confirm(caller, tx_id)
    }

    pub fn revoke(&self, caller: &Address, tx_id: u64) -> Result<(), MultisigError> {
        self.lock().wallet.revoke(caller, tx_id)
    }

    pub fn execute(&self, caller: &Address, tx_id: u64) -> Result<(), MultisigError> {
        let mut guard = self.lock();
        let Inner { wallet, executor } = &mut *guard;
        wallet.execute(caller, tx_id, executor)
    }

    /// Run a closure with read access to the wallet and executor
    pub fn inspect<R>(&self, f: impl FnOnce(&MultisigWallet, &E) -> R) -> R {
        let guard = self.lock();
        f(&guard.wallet, &guard.executor)
    }
}
