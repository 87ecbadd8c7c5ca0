//! REST API handlers for multisig wallet operations

use crate::multisig::{
    parse_hex_data, Address, MultisigError, MultisigManager, MultisigWallet, Transaction,
    WalletConfig, WalletEvent,
};
use crate::storage::{DeploymentRecord, Storage};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
///
/// The registry lock is the serialization point for all wallet operations.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<RwLock<MultisigManager>>,
    pub storage: Arc<Storage>,
}

impl ApiState {
    pub fn new(manager: MultisigManager, storage: Storage) -> Self {
        Self {
            manager: Arc::new(RwLock::new(manager)),
            storage: Arc::new(storage),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiError {
    pub error: String,
}

/// Error half of every handler result
pub type ApiFailure = (StatusCode, Json<ApiError>);

/// Multisig wallet info response
#[derive(Serialize, Debug)]
pub struct WalletInfo {
    pub address: String,
    pub owners: Vec<String>,
    pub threshold: usize,
    pub description: String,
    pub label: Option<String>,
    pub balance: u128,
    pub transaction_count: usize,
    pub created_at: String,
}

impl WalletInfo {
    fn new(wallet: &MultisigWallet, balance: u128) -> Self {
        Self {
            address: wallet.address().to_string(),
            owners: wallet.owners().iter().map(|o| o.to_string()).collect(),
            threshold: wallet.threshold(),
            description: wallet.description(),
            label: wallet.config().label.clone(),
            balance,
            transaction_count: wallet.transaction_count(),
            created_at: wallet.created_at.to_rfc3339(),
        }
    }
}

/// Transaction info response
#[derive(Serialize, Debug)]
pub struct TransactionInfo {
    pub id: u64,
    pub to: String,
    pub value: u128,
    pub data: String,
    pub executed: bool,
    pub status: String,
    pub num_confirmations: usize,
    pub confirmations_required: usize,
    pub confirmed_by: Vec<String>,
    pub proposer: String,
    pub proposed_at: String,
    pub executed_by: Option<String>,
    pub executed_at: Option<String>,
}

impl TransactionInfo {
    fn new(tx: &Transaction, threshold: usize) -> Self {
        Self {
            id: tx.id,
            to: tx.to.to_string(),
            value: tx.value,
            data: format!("0x{}", hex::encode(&tx.data)),
            executed: tx.executed,
            status: format!("{:?}", tx.status(threshold)),
            num_confirmations: tx.num_confirmations(),
            confirmations_required: threshold,
            confirmed_by: tx.confirmed_by().iter().map(|o| o.to_string()).collect(),
            proposer: tx.proposer.to_string(),
            proposed_at: tx.proposed_at.to_rfc3339(),
            executed_by: tx.executed_by.map(|a| a.to_string()),
            executed_at: tx.executed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct DepositResponse {
    pub wallet: String,
    pub balance: u128,
}

// ============================================================================
// Request Types
// ============================================================================

/// Request to deploy a multisig wallet
#[derive(Deserialize)]
pub struct DeployRequest {
    pub deployer: String,
    pub owners: Vec<String>,
    pub threshold: usize,
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub from: String,
    pub amount: u128,
}

/// Request to propose a transaction
#[derive(Deserialize)]
pub struct ProposeRequest {
    pub caller: String,
    pub to: String,
    pub value: u128,
    /// Hex payload, optional `0x` prefix
    pub data: Option<String>,
}

/// Body of confirm, revoke and execute
#[derive(Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn api_error(status: StatusCode, error: String) -> ApiFailure {
    (status, Json(ApiError { error }))
}

/// HTTP status for a wallet error
pub fn status_for(err: &MultisigError) -> StatusCode {
    match err {
        MultisigError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
        MultisigError::Unauthorized(_) => StatusCode::FORBIDDEN,
        MultisigError::NotFound(_) | MultisigError::WalletNotFound(_) => StatusCode::NOT_FOUND,
        MultisigError::AlreadyExecuted(_)
        | MultisigError::AlreadyConfirmed { .. }
        | MultisigError::NotConfirmed { .. }
        | MultisigError::InsufficientConfirmations { .. } => StatusCode::CONFLICT,
        MultisigError::ActionFailed { .. } | MultisigError::DepositFailed(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MultisigError::CorruptState(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn multisig_error(err: MultisigError) -> ApiFailure {
    api_error(status_for(&err), err.to_string())
}

fn parse_address(field: &str, value: &str) -> Result<Address, ApiFailure> {
    value.parse().map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid {} address: {}", field, e),
        )
    })
}

fn persist(state: &ApiState, manager: &MultisigManager) -> Result<(), ApiFailure> {
    state.storage.save(manager).map_err(|e| {
        log::error!("Failed to save wallet registry: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save wallet registry: {}", e),
        )
    })
}

/// Run a mutation against a copy of the registry and install the copy only
/// after it is saved
///
/// Rejected operations and failed saves leave the shared registry as it was.
/// `ActionFailed` is the one error that is still saved and installed, since
/// the transaction is executed either way.
async fn commit<T>(
    state: &ApiState,
    op: impl FnOnce(&mut MultisigManager) -> Result<T, MultisigError>,
) -> Result<T, ApiFailure> {
    let mut manager = state.manager.write().await;
    let mut next = manager.clone();

    let outcome = op(&mut next);
    if let Err(e) = &outcome {
        if !matches!(e, MultisigError::ActionFailed { .. }) {
            return Err(multisig_error(e.clone()));
        }
    }

    persist(state, &next)?;
    *manager = next;
    outcome.map_err(multisig_error)
}

fn transaction_info(
    manager: &MultisigManager,
    wallet: &Address,
    tx_id: u64,
) -> Result<TransactionInfo, MultisigError> {
    let w = manager.wallet(wallet)?;
    let tx = w.transaction(tx_id)?;
    Ok(TransactionInfo::new(tx, w.threshold()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/wallets - List all multisig wallets
pub async fn list_wallets(State(state): State<ApiState>) -> Json<Vec<WalletInfo>> {
    let manager = state.manager.read().await;
    let wallets = manager
        .list_wallets()
        .into_iter()
        .map(|w| WalletInfo::new(w, manager.balance(w.address())))
        .collect();

    Json(wallets)
}

/// POST /api/wallets - Deploy a multisig wallet
pub async fn deploy_wallet(
    State(state): State<ApiState>,
    Json(req): Json<DeployRequest>,
) -> Result<Json<WalletInfo>, ApiFailure> {
    let deployer = parse_address("deployer", &req.deployer)?;
    let owners = req
        .owners
        .iter()
        .map(|o| parse_address("owner", o))
        .collect::<Result<Vec<_>, _>>()?;
    let config = WalletConfig::new(owners, req.threshold, req.label).map_err(multisig_error)?;

    let (address, info) = commit(&state, |m| {
        let address = m.deploy(&deployer, config)?;
        let info = WalletInfo::new(m.wallet(&address)?, m.balance(&address));
        Ok((address, info))
    })
    .await?;

    if let Err(e) = state
        .storage
        .save_deployment(&DeploymentRecord::new(address, deployer))
    {
        log::warn!("Failed to write deployment record: {}", e);
    }

    Ok(Json(info))
}

/// GET /api/wallets/{address} - Get multisig wallet details
pub async fn get_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<WalletInfo>, ApiFailure> {
    let address = parse_address("wallet", &address)?;
    let manager = state.manager.read().await;
    let wallet = manager.wallet(&address).map_err(multisig_error)?;

    Ok(Json(WalletInfo::new(wallet, manager.balance(&address))))
}

/// POST /api/wallets/{address}/deposit - Send funds to a wallet
pub async fn deposit(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiFailure> {
    let wallet = parse_address("wallet", &address)?;
    let from = parse_address("sender", &req.from)?;
    let amount = req.amount;

    let balance = commit(&state, |m| m.deposit(&wallet, &from, amount)).await?;

    Ok(Json(DepositResponse {
        wallet: wallet.to_string(),
        balance,
    }))
}

/// GET /api/wallets/{address}/transactions - List transactions
pub async fn list_transactions(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<TransactionInfo>>, ApiFailure> {
    let address = parse_address("wallet", &address)?;
    let manager = state.manager.read().await;
    let wallet = manager.wallet(&address).map_err(multisig_error)?;

    Ok(Json(
        wallet
            .transactions()
            .iter()
            .map(|tx| TransactionInfo::new(tx, wallet.threshold()))
            .collect(),
    ))
}

/// POST /api/wallets/{address}/transactions - Propose a transaction
pub async fn propose_transaction(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<TransactionInfo>, ApiFailure> {
    let wallet = parse_address("wallet", &address)?;
    let caller = parse_address("caller", &req.caller)?;
    let to = parse_address("recipient", &req.to)?;
    let value = req.value;
    let data = match req.data.as_deref() {
        Some(hex) => parse_hex_data(hex).map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("Invalid data: {}", e))
        })?,
        None => Vec::new(),
    };

    let info = commit(&state, |m| {
        let tx_id = m.propose(&wallet, &caller, to, value, data)?.id;
        transaction_info(m, &wallet, tx_id)
    })
    .await?;

    Ok(Json(info))
}

/// GET /api/wallets/{address}/transactions/{id} - Get a transaction
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path((address, tx_id)): Path<(String, u64)>,
) -> Result<Json<TransactionInfo>, ApiFailure> {
    let wallet = parse_address("wallet", &address)?;
    let manager = state.manager.read().await;
    let info = transaction_info(&manager, &wallet, tx_id).map_err(multisig_error)?;
    Ok(Json(info))
}

/// POST /api/wallets/{address}/transactions/{id}/confirm
pub async fn confirm_transaction(
    State(state): State<ApiState>,
    Path((address, tx_id)): Path<(String, u64)>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<TransactionInfo>, ApiFailure> {
    let wallet = parse_address("wallet", &address)?;
    let caller = parse_address("caller", &req.caller)?;

    let info = commit(&state, |m| {
        m.confirm(&wallet, &caller, tx_id)?;
        transaction_info(m, &wallet, tx_id)
    })
    .await?;

    Ok(Json(info))
}

/// POST /api/wallets/{address}/transactions/{id}/revoke
pub async fn revoke_confirmation(
    State(state): State<ApiState>,
    Path((address, tx_id)): Path<(String, u64)>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<TransactionInfo>, ApiFailure> {
    let wallet = parse_address("wallet", &address)?;
    let caller = parse_address("caller", &req.caller)?;

    let info = commit(&state, |m| {
        m.revoke(&wallet, &caller, tx_id)?;
        transaction_info(m, &wallet, tx_id)
    })
    .await?;

    Ok(Json(info))
}

/// POST /api/wallets/{address}/transactions/{id}/execute
///
/// A failed action answers 422 but the transaction is executed and saved.
pub async fn execute_transaction(
    State(state): State<ApiState>,
    Path((address, tx_id)): Path<(String, u64)>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<TransactionInfo>, ApiFailure> {
    let wallet = parse_address("wallet", &address)?;
    let caller = parse_address("caller", &req.caller)?;

    let info = commit(&state, |m| {
        m.execute(&wallet, &caller, tx_id)?;
        transaction_info(m, &wallet, tx_id)
    })
    .await?;

    Ok(Json(info))
}

/// GET /api/wallets/{address}/events - Wallet event log
pub async fn list_events(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<WalletEvent>>, ApiFailure> {
    let address = parse_address("wallet", &address)?;
    let manager = state.manager.read().await;
    let wallet = manager.wallet(&address).map_err(multisig_error)?;

    Ok(Json(wallet.events().to_vec()))
}
