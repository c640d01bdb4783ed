//! Secondary-market endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::ApiError;
use crate::domain::{CancelOutcome, ListOutcome, Listing, SaleOutcome};
use crate::server::AppState;

pub async fn active(State(state): State<AppState>) -> Result<Json<Vec<Listing>>, ApiError> {
    Ok(Json(state.marketplace.active_listings().await?))
}

#[derive(Deserialize)]
pub struct ListForSaleRequest {
    pub user_id: i64,
    pub token_id: i64,
    pub price: i64,
}

pub async fn list_for_sale(
    State(state): State<AppState>,
    Json(request): Json<ListForSaleRequest>,
) -> Result<(StatusCode, Json<ListOutcome>), ApiError> {
    let outcome = state
        .marketplace
        .list_item_for_sale(request.user_id, request.token_id, request.price)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Deserialize)]
pub struct BuyRequest {
    pub user_id: i64,
}

pub async fn buy(
    State(state): State<AppState>,
    Path(token_id): Path<i64>,
    Json(request): Json<BuyRequest>,
) -> Result<Json<SaleOutcome>, ApiError> {
    let outcome = state
        .marketplace
        .buy_listed_item(request.user_id, token_id)
        .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub user_id: i64,
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(token_id): Path<i64>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<CancelOutcome>, ApiError> {
    let outcome = state
        .marketplace
        .cancel_listing_for_user(request.user_id, token_id)
        .await?;
    Ok(Json(outcome))
}

/// Notification that an external wallet listed a token. The body is only a
/// hint; the service reads the authoritative state from the contract.
pub async fn external_notification(
    State(state): State<AppState>,
    Path(token_id): Path<i64>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    let listing = state.marketplace.record_external_listing(token_id).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}
