//! REST API module
//!
//! Provides HTTP REST API for programmatic access to multisig wallets.
//! Every mutating request names its caller explicitly in the body.
//!
//! # Endpoints
//!
//! ## Wallets
//! - `GET /api/wallets` - List wallets
//! - `POST /api/wallets` - Deploy wallet
//! - `GET /api/wallets/{address}` - Wallet details and balance
//! - `POST /api/wallets/{address}/deposit` - Send funds to a wallet
//! - `GET /api/wallets/{address}/events` - Wallet event log
//!
//! ## Transactions
//! - `GET /api/wallets/{address}/transactions` - List transactions
//! - `POST /api/wallets/{address}/transactions` - Propose transaction
//! - `GET /api/wallets/{address}/transactions/{id}` - Get transaction
//! - `POST /api/wallets/{address}/transactions/{id}/confirm` - Confirm
//! - `POST /api/wallets/{address}/transactions/{id}/revoke` - Revoke confirmation
//! - `POST /api/wallets/{address}/transactions/{id}/execute` - Execute

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
