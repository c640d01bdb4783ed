//! Ticket read-cache access and custody withdrawal.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::ApiError;
use crate::domain::{ReconcileReport, Ticket};
use crate::server::AppState;

#[derive(Deserialize)]
pub struct TicketsQuery {
    pub owner: String,
}

pub async fn by_owner(
    State(state): State<AppState>,
    Query(query): Query<TicketsQuery>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let tickets = state.marketplace.tickets_by_owner(&query.owner).await?;
    Ok(Json(tickets))
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub user_id: i64,
    pub to_address: String,
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(token_id): Path<i64>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let to = request
        .to_address
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid address: {}", request.to_address)))?;

    let report = state
        .marketplace
        .withdraw_ticket(request.user_id, to, token_id)
        .await?;
    Ok(Json(report))
}
