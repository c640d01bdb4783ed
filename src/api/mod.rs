//! HTTP boundary: thin request/response translation over the services.
//!
//! Handlers take plain identifiers and amounts, call one service method,
//! and let [`error::ApiError`] map the typed result. Authentication and
//! session handling live outside this crate's contract.

pub mod error;
pub mod handlers;

use axum::routing::{get, post, put};
use axum::Router;

use crate::server::AppState;

pub use error::{ApiError, ErrorCode};

/// Public API routes, nested under `/api` by the server.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::users::register))
        .route("/users/:user_id", get(handlers::users::get_user))
        .route(
            "/users/:user_id/wallet-mode",
            put(handlers::users::set_wallet_mode),
        )
        .route("/users/:user_id/roles", put(handlers::users::set_roles))
        .route("/events", get(handlers::events::list).post(handlers::events::create))
        .route("/events/:event_id", get(handlers::events::get_event))
        .route("/events/:event_id/register", post(handlers::events::register_onchain))
        .route("/events/:event_id/mint", post(handlers::events::mint))
        .route("/events/:event_id/purchase", post(handlers::events::purchase))
        .route("/tickets", get(handlers::tickets::by_owner))
        .route("/tickets/:token_id/withdraw", post(handlers::tickets::withdraw))
        .route(
            "/listings",
            get(handlers::marketplace::active).post(handlers::marketplace::list_for_sale),
        )
        .route("/listings/:token_id/buy", post(handlers::marketplace::buy))
        .route(
            "/listings/:token_id/cancel",
            post(handlers::marketplace::cancel),
        )
        .route(
            "/listings/:token_id/external",
            post(handlers::marketplace::external_notification),
        )
}

/// Internal operational routes (sync trigger, reconciliation), nested
/// under `/internal`.
pub fn internal_router() -> Router<AppState> {
    Router::new()
        .route("/sync", post(handlers::internal::trigger_sync))
        .route(
            "/reconcile/:token_id",
            post(handlers::internal::reconcile_owner),
        )
}
