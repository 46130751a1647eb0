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

use crate::handlers::{cards, health, redemptions};
use crate::state::AppState;

/// Maximum concurrent requests for the administrative API.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Cards (admin key auth)
/// - `POST /v1/cards` - Create a card
/// - `POST /v1/cards/batch` - Create several cards from one configuration
/// - `GET /v1/cards` - List cards (optional status filter, paginated)
/// - `GET /v1/cards/stats` - Per-status card counts
/// - `GET /v1/cards/code/:code` - Look up a card by code
/// - `GET /v1/cards/:id` - Look up a card by id
/// - `DELETE /v1/cards/:id` - Delete an unused card
///
/// ## Redemptions (admin key auth)
/// - `POST /v1/redemptions` - Redeem a card onto a credential
/// - `GET /v1/redemptions` - List ledger entries (user/credential filter)
/// - `POST /v1/redemptions/:id/revoke` - Revoke an active redemption
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Cards
        .route("/cards", post(cards::create_card).get(cards::list_cards))
        .route("/cards/batch", post(cards::create_cards_batch))
        .route("/cards/stats", get(cards::card_stats))
        .route("/cards/code/:code", get(cards::get_card_by_code))
        .route(
            "/cards/:id",
            get(cards::get_card).delete(cards::delete_card),
        )
        // Redemptions
        .route(
            "/redemptions",
            post(redemptions::redeem_card).get(redemptions::list_redemptions),
        )
        .route(
            "/redemptions/:id/revoke",
            post(redemptions::revoke_redemption),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // API v1 routes
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
