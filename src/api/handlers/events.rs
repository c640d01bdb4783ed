//! Event creation, registration, and primary issuance.

use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::domain::{MintOutcome, NewEvent, TicketedEvent};
use crate::server::AppState;

#[derive(Deserialize)]
pub struct CreateEventRequest {
    #[serde(flatten)]
    pub event: NewEvent,
    pub creator_address: String,
}

#[derive(Serialize)]
pub struct CreateEventResponse {
    pub event: TicketedEvent,
    pub registration_tx_hash: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<CreateEventResponse>), ApiError> {
    let creator = parse_address(&request.creator_address)?;
    let (event, confirmation) = state.issuance.create_event(request.event, creator).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            event,
            registration_tx_hash: confirmation.tx_hash,
        }),
    ))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<TicketedEvent>>, ApiError> {
    Ok(Json(state.issuance.list_events().await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> Result<Json<TicketedEvent>, ApiError> {
    Ok(Json(state.issuance.event(event_id).await?))
}

#[derive(Deserialize)]
pub struct RegisterOnchainRequest {
    pub creator_address: String,
}

pub async fn register_onchain(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<RegisterOnchainRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let creator = parse_address(&request.creator_address)?;
    let confirmation = state
        .issuance
        .register_event_onchain(event_id, creator)
        .await?;

    Ok(Json(serde_json::json!({
        "registration_tx_hash": confirmation.tx_hash,
        "block_number": confirmation.block_number,
    })))
}

#[derive(Deserialize)]
pub struct MintRequest {
    pub recipient_address: String,
    pub user_id: Option<i64>,
}

pub async fn mint(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<MintRequest>,
) -> Result<(StatusCode, Json<MintOutcome>), ApiError> {
    let recipient = parse_address(&request.recipient_address)?;
    let outcome = state
        .issuance
        .mint_ticket(event_id, recipient, request.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub user_id: i64,
}

pub async fn purchase(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<MintOutcome>), ApiError> {
    let outcome = state
        .issuance
        .purchase_primary(request.user_id, event_id)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid address: {raw}")))
}
