//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Unknown routes answer with a JSON 404
async fn fallback_handler(uri: axum::http::Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(handlers::ApiError {
            error: format!("No route for {}", uri.path()),
        }),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Wallets
        .route(
            "/api/wallets",
            get(handlers::list_wallets).post(handlers::deploy_wallet),
        )
        .route("/api/wallets/{address}", get(handlers::get_wallet))
        .route("/api/wallets/{address}/deposit", post(handlers::deposit))
        .route("/api/wallets/{address}/events", get(handlers::list_events))
        // Transactions
        .route(
            "/api/wallets/{address}/transactions",
            get(handlers::list_transactions).post(handlers::propose_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}",
            get(handlers::get_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/confirm",
            post(handlers::confirm_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/revoke",
            post(handlers::revoke_confirmation),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/execute",
            post(handlers::execute_transaction),
        )
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
