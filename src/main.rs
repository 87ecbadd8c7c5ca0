//! Multisig Wallet CLI Application
//!
//! A command-line interface for deploying and operating multi-signature
//! approval wallets.

use clap::{Parser, Subcommand};
use multisig_wallet::api::{create_router, ApiState};
use multisig_wallet::cli::{self, AppState};
use multisig_wallet::multisig::{Address, WalletConfig};
use multisig_wallet::storage::{Storage, StorageConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(version = "0.1.0")]
#[command(about = "Multi-signature approval wallets in Rust", long_about = None)]
struct Cli {
    /// Data directory for the wallet registry
    #[arg(short, long, default_value = ".multisig_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a new multisig wallet
    Deploy {
        /// Address performing the deployment
        #[arg(long)]
        deployer: Address,

        /// Owner addresses (comma-separated)
        #[arg(short, long, required_unless_present = "config")]
        owners: Option<String>,

        /// Number of confirmations required
        #[arg(short, long, required_unless_present = "config")]
        threshold: Option<usize>,

        /// Optional label for the wallet
        #[arg(short, long)]
        label: Option<String>,

        /// JSON file with owners, threshold and label
        #[arg(short, long, conflicts_with_all = ["owners", "threshold", "label"])]
        config: Option<PathBuf>,
    },

    /// Send funds to a wallet
    Deposit {
        #[arg(short, long)]
        wallet: Address,

        /// Sender address
        #[arg(short, long)]
        from: Address,

        #[arg(short, long)]
        amount: u128,
    },

    /// Propose a transaction
    Propose {
        #[arg(short, long)]
        wallet: Address,

        /// Proposing owner
        #[arg(short, long)]
        caller: Address,

        /// Recipient address
        #[arg(short, long)]
        to: Address,

        /// Amount to send
        #[arg(short, long)]
        value: u128,

        /// Call payload as hex
        #[arg(long)]
        data: Option<String>,
    },

    /// Confirm a pending transaction
    Confirm {
        #[arg(short, long)]
        wallet: Address,

        #[arg(short, long)]
        caller: Address,

        /// Transaction id
        #[arg(long)]
        tx: u64,
    },

    /// Revoke a confirmation
    Revoke {
        #[arg(short, long)]
        wallet: Address,

        #[arg(short, long)]
        caller: Address,

        /// Transaction id
        #[arg(long)]
        tx: u64,
    },

    /// Execute a confirmed transaction
    Execute {
        #[arg(short, long)]
        wallet: Address,

        #[arg(short, long)]
        caller: Address,

        /// Transaction id
        #[arg(long)]
        tx: u64,
    },

    /// List all wallets
    List,

    /// Show wallet details
    Info {
        #[arg(short, long)]
        wallet: Address,
    },

    /// Show a transaction
    Tx {
        #[arg(short, long)]
        wallet: Address,

        /// Transaction id
        #[arg(long)]
        tx: u64,
    },

    /// Show a wallet's event log
    Events {
        #[arg(short, long)]
        wallet: Address,
    },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle API commands with tokio runtime
    if let Commands::Api { ref action } = cli.command {
        return run_api_command(action, &cli.data_dir);
    }

    // Initialize application state
    let mut state = AppState::new(cli.data_dir.clone())?;

    // Process commands
    match cli.command {
        Commands::Api { .. } => unreachable!(),

        Commands::Deploy {
            deployer,
            owners,
            threshold,
            label,
            config,
        } => {
            let config = match (config, owners, threshold) {
                (Some(path), _, _) => cli::load_wallet_config(&path)?,
                (None, Some(owners), Some(threshold)) => {
                    WalletConfig::new(cli::parse_owners(&owners)?, threshold, label)?
                }
                _ => return Err("either --config or --owners with --threshold is required".into()),
            };
            cli::cmd_deploy(&mut state, &deployer, config)?;
        }

        Commands::Deposit {
            wallet,
            from,
            amount,
        } => {
            cli::cmd_deposit(&mut state, &wallet, &from, amount)?;
        }

        Commands::Propose {
            wallet,
            caller,
            to,
            value,
            data,
        } => {
            cli::cmd_propose(&mut state, &wallet, &caller, to, value, data.as_deref())?;
        }

        Commands::Confirm { wallet, caller, tx } => {
            cli::cmd_confirm(&mut state, &wallet, &caller, tx)?;
        }

        Commands::Revoke { wallet, caller, tx } => {
            cli::cmd_revoke(&mut state, &wallet, &caller, tx)?;
        }

        Commands::Execute { wallet, caller, tx } => {
            cli::cmd_execute(&mut state, &wallet, &caller, tx)?;
        }

        Commands::List => {
            cli::cmd_list(&state)?;
        }

        Commands::Info { wallet } => {
            cli::cmd_info(&state, &wallet)?;
        }

        Commands::Tx { wallet, tx } => {
            cli::cmd_tx(&state, &wallet, tx)?;
        }

        Commands::Events { wallet } => {
            cli::cmd_events(&state, &wallet)?;
        }
    }

    Ok(())
}

fn run_api_command(
    action: &ApiCommands,
    data_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match action {
            ApiCommands::Start { port } => {
                // Initialize storage
                let storage_config = StorageConfig {
                    data_dir: data_dir.clone(),
                    ..Default::default()
                };
                let storage = Storage::new(storage_config)?;

                // Keep CLI commands off the registry while the server owns it
                let registry_lock = storage.lock()?;
                log::info!("Holding registry lock {:?}", registry_lock.path());

                // Load or create the wallet registry
                if storage.exists() {
                    println!("📂 Loading existing wallet registry...");
                } else {
                    println!("📂 Creating new wallet registry...");
                }
                let manager = storage.load_or_default()?;
                log::info!("Loaded {} wallet(s)", manager.wallet_count());

                let state = ApiState::new(manager, storage);

                // Clone state for shutdown handler
                let shutdown_state = state.clone();

                // Create router
                let app = create_router(state);

                // Start server
                let addr = format!("0.0.0.0:{}", port);
                println!("🚀 REST API server starting on http://localhost:{}", port);

                println!();
                println!("📖 Available endpoints:");
                println!("   GET  /health                                   - Health check");
                println!("   GET  /api/wallets                              - List wallets");
                println!("   POST /api/wallets                              - Deploy wallet");
                println!("   GET  /api/wallets/{{addr}}                       - Wallet details");
                println!("   POST /api/wallets/{{addr}}/deposit               - Deposit funds");
                println!("   GET  /api/wallets/{{addr}}/events                - Event log");
                println!("   GET  /api/wallets/{{addr}}/transactions          - List transactions");
                println!("   POST /api/wallets/{{addr}}/transactions          - Propose transaction");
                println!("   GET  /api/wallets/{{addr}}/transactions/{{id}}     - Get transaction");
                println!("   POST /api/wallets/{{addr}}/transactions/{{id}}/confirm - Confirm");
                println!("   POST /api/wallets/{{addr}}/transactions/{{id}}/revoke  - Revoke");
                println!("   POST /api/wallets/{{addr}}/transactions/{{id}}/execute - Execute");
                println!();

                // Handle Ctrl+C with graceful shutdown
                tokio::spawn(async move {
                    tokio::signal::ctrl_c().await.ok();
                    println!("\n📴 Shutting down API server...");

                    // Save all data before exit
                    println!("💾 Saving data...");
                    let manager = shutdown_state.manager.read().await;
                    match shutdown_state.storage.save(&manager) {
                        Ok(()) => println!("✅ Data saved successfully!"),
                        Err(e) => log::error!("Failed to save wallet registry: {}", e),
                    }
                    std::process::exit(0);
                });

                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app).await?;
                drop(registry_lock);
            }
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
