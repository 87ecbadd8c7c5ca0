//! CLI commands for multisig wallets
//!
//! Implements all command handlers for the CLI interface. Every mutating
//! command loads the registry, applies one operation and saves it back.

use crate::multisig::{
    parse_hex_data, Address, MultisigError, MultisigManager, MultisigWallet, Transaction,
    WalletConfig, WalletEvent,
};
use crate::storage::{DeploymentRecord, RegistryLock, Storage, StorageConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
///
/// Holds the registry lock from load until the state is dropped, so two
/// commands never work on the same registry at once.
pub struct AppState {
    pub manager: MultisigManager,
    pub storage: Storage,
    pub data_dir: PathBuf,
    _lock: RegistryLock,
}

impl AppState {
    /// Lock and load the registry from `data_dir`, starting empty if there is none
    ///
    /// Fails with `StorageError::Locked` while another command or a running
    /// API server holds the registry.
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage_config = StorageConfig {
            data_dir: data_dir.clone(),
            ..Default::default()
        };

        let storage = Storage::new(storage_config)?;
        let lock = storage.lock()?;
        let manager = storage.load_or_default()?;

        Ok(Self {
            manager,
            storage,
            data_dir,
            _lock: lock,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.manager)?;
        Ok(())
    }
}

/// Parse a comma-separated owner list
pub fn parse_owners(list: &str) -> CliResult<Vec<Address>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Address>()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        })
        .collect()
}

/// Read a wallet configuration (owners, threshold, label) from a JSON file
pub fn load_wallet_config(path: &Path) -> CliResult<WalletConfig> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Deploy a new wallet and write the deployment record
pub fn cmd_deploy(
    state: &mut AppState,
    deployer: &Address,
    config: WalletConfig,
) -> CliResult<Address> {
    let description = config.description();
    let address = state.manager.deploy(deployer, config)?;
    state.save()?;
    state
        .storage
        .save_deployment(&DeploymentRecord::new(address, *deployer))?;

    println!("🔐 Multisig wallet deployed!");
    println!("   📍 Address: {}", address);
    println!("   👥 Policy: {}", description);
    println!("   🧑 Deployer: {}", deployer);

    Ok(address)
}

/// Send funds to a wallet
pub fn cmd_deposit(
    state: &mut AppState,
    wallet: &Address,
    from: &Address,
    amount: u128,
) -> CliResult<()> {
    let balance = state.manager.deposit(wallet, from, amount)?;
    state.save()?;

    println!("💰 Deposited {} to {}", amount, wallet);
    println!("   New balance: {}", balance);

    Ok(())
}

/// Propose a transaction
pub fn cmd_propose(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    to: Address,
    value: u128,
    data: Option<&str>,
) -> CliResult<u64> {
    let data = match data {
        Some(hex) => parse_hex_data(hex)?,
        None => Vec::new(),
    };

    let tx_id = state.manager.propose(wallet, caller, to, value, data)?.id;
    state.save()?;

    println!("📝 Transaction {} proposed", tx_id);
    println!("   To: {}", to);
    println!("   Value: {}", value);

    Ok(tx_id)
}

/// Confirm a transaction
pub fn cmd_confirm(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    tx_id: u64,
) -> CliResult<()> {
    let threshold = state.manager.wallet(wallet)?.threshold();
    let count = state.manager.confirm(wallet, caller, tx_id)?.num_confirmations();
    state.save()?;

    println!("✅ Transaction {} confirmed by {}", tx_id, caller);
    println!("   Confirmations: {}/{}", count, threshold);
    if count >= threshold {
        println!("   Ready to execute.");
    }

    Ok(())
}

/// Revoke a confirmation
pub fn cmd_revoke(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    tx_id: u64,
) -> CliResult<()> {
    let threshold = state.manager.wallet(wallet)?.threshold();
    let count = state.manager.revoke(wallet, caller, tx_id)?.num_confirmations();
    state.save()?;

    println!("↩️  Confirmation of transaction {} revoked by {}", tx_id, caller);
    println!("   Confirmations: {}/{}", count, threshold);

    Ok(())
}

/// Execute a transaction
///
/// A failed action still leaves the transaction executed, so that outcome
/// is saved too.
pub fn cmd_execute(
    state: &mut AppState,
    wallet: &Address,
    caller: &Address,
    tx_id: u64,
) -> CliResult<()> {
    let outcome = state.manager.execute(wallet, caller, tx_id).map(|tx| tx.value);
    if matches!(outcome, Ok(_) | Err(MultisigError::ActionFailed { .. })) {
        state.save()?;
    }

    match outcome {
        Ok(value) => {
            println!("🚀 Transaction {} executed by {}", tx_id, caller);
            println!("   Transferred: {}", value);
            println!("   Wallet balance: {}", state.manager.balance(wallet));
            Ok(())
        }
        Err(e @ MultisigError::ActionFailed { .. }) => {
            println!(
                "⚠️  Transaction {} marked executed by {}, but its action failed",
                tx_id, caller
            );
            println!("   Wallet balance: {}", state.manager.balance(wallet));
            println!("   Propose a new transaction to try again.");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// List all wallets
pub fn cmd_list(state: &AppState) -> CliResult<()> {
    let wallets = state.manager.list_wallets();

    if wallets.is_empty() {
        println!("📭 No wallets found. Deploy one with: multisig deploy");
        return Ok(());
    }

    println!("📋 Wallets:");
    for wallet in wallets {
        let label = wallet.config().label.as_deref().unwrap_or("-");
        println!(
            "   {} ({}) {} - {} tx - balance {}",
            wallet.address(),
            label,
            wallet.description(),
            wallet.transaction_count(),
            state.manager.balance(wallet.address())
        );
    }

    Ok(())
}

/// Show wallet details
pub fn cmd_info(state: &AppState, address: &Address) -> CliResult<()> {
    let wallet = state.manager.wallet(address)?;
    print_wallet(wallet, state.manager.balance(address));
    Ok(())
}

/// Show one transaction
pub fn cmd_tx(state: &AppState, wallet: &Address, tx_id: u64) -> CliResult<()> {
    let w = state.manager.wallet(wallet)?;
    let tx = w.transaction(tx_id)?;
    print_transaction(tx, w.threshold());
    Ok(())
}

/// Show the wallet event log
pub fn cmd_events(state: &AppState, wallet: &Address) -> CliResult<()> {
    let events = state.manager.wallet(wallet)?.events();

    println!("📜 Events for {} ({})", wallet, events.len());
    for event in events {
        print_event(event);
    }

    Ok(())
}

fn print_wallet(wallet: &MultisigWallet, balance: u128) {
    println!("🔐 Multisig wallet {}", wallet.address());
    if let Some(label) = &wallet.config().label {
        println!("   🏷️  Label: {}", label);
    }
    println!("   ├─ Policy: {}", wallet.description());
    println!("   ├─ Balance: {}", balance);
    println!("   ├─ Created: {}", wallet.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("   ├─ Owners:");
    for owner in wallet.owners() {
        println!("   │   └─ {}", owner);
    }
    println!("   └─ Transactions: {}", wallet.transaction_count());
    for tx in wallet.transactions() {
        println!(
            "       #{} → {} value {} [{:?}] {}/{}",
            tx.id,
            tx.to,
            tx.value,
            tx.status(wallet.threshold()),
            tx.num_confirmations(),
            wallet.threshold()
        );
    }
}

fn print_transaction(tx: &Transaction, threshold: usize) {
    println!("📄 Transaction {}", tx.id);
    println!("   ├─ To: {}", tx.to);
    println!("   ├─ Value: {}", tx.value);
    println!("   ├─ Data: 0x{}", hex::encode(&tx.data));
    println!("   ├─ Proposer: {}", tx.proposer);
    println!("   ├─ Status: {:?}", tx.status(threshold));
    println!(
        "   ├─ Confirmations: {}/{}",
        tx.num_confirmations(),
        threshold
    );
    for c in tx.confirmations() {
        println!(
            "   │   └─ {} at {}",
            c.owner,
            c.confirmed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    match (tx.executed_by, tx.executed_at) {
        (Some(by), Some(at)) => println!(
            "   └─ Executed by {} at {}",
            by,
            at.format("%Y-%m-%d %H:%M:%S")
        ),
        _ => println!("   └─ Not executed"),
    }
}

fn print_event(event: &WalletEvent) {
    println!(
        "   #{} {} {:?}",
        event.seq,
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.kind
    );
}
