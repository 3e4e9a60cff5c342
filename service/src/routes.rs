//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, health, interest, ledger, transfers};
use crate::state::AppState;

/// Maximum concurrent requests for money-moving and ledger endpoints.
/// Each one holds a blocking-pool thread while it waits on row locks.
const API_MAX_CONCURRENT_REQUESTS: usize = 64;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Transfers
/// - `POST /v1/transfers` - Initiate a transfer
/// - `GET /v1/transfers/:id` - Look up a transfer by idempotency key
/// - `GET /v1/transfers/:id/entries` - Ledger entries of a transfer, by idempotency key
/// - `POST /v1/transfers/:id/reversal` - Reverse a transfer, by transaction log id
///
/// ## Accounts and ledger
/// - `GET /v1/accounts/:id` - Account balance
/// - `GET /v1/ledger/:transaction_id` - Entries of one ledger transaction
///
/// ## Interest
/// - `POST /v1/interest/accrue` - Run one accrual pass
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Transfers
        .route("/transfers", post(transfers::create_transfer))
        .route("/transfers/:id", get(transfers::get_transfer))
        .route("/transfers/:id/entries", get(transfers::list_transfer_entries))
        .route("/transfers/:id/reversal", post(transfers::reverse_transfer))
        // Accounts and ledger
        .route("/accounts/:id", get(accounts::get_account))
        .route("/ledger/:transaction_id", get(ledger::get_ledger_transaction))
        // Interest
        .route("/interest/accrue", post(interest::accrue_interest))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
