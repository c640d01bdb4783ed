//! User registration and account preferences.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::domain::{User, WalletMode};
use crate::server::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    /// Hash computed by the authentication layer; never a raw password.
    pub password_hash: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
    pub wallet_address: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if request.username.is_empty() || request.username.len() > 64 {
        return Err(ApiError::bad_request("username must be 1-64 characters"));
    }

    let user = state
        .accounts
        .register_user(&request.username, &request.password_hash)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.user_id,
            username: user.username,
            wallet_address: user.wallet_address,
        }),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = state.accounts.user(user_id).await?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct RolesRequest {
    pub is_admin: bool,
    pub is_creator: bool,
}

pub async fn set_roles(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<RolesRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .set_roles(user_id, request.is_admin, request.is_creator)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct WalletModeRequest {
    pub wallet_mode: String,
}

pub async fn set_wallet_mode(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<WalletModeRequest>,
) -> Result<StatusCode, ApiError> {
    let mode = WalletMode::parse(&request.wallet_mode)
        .ok_or_else(|| ApiError::bad_request("wallet_mode must be 'internal' or 'external'"))?;

    state.accounts.set_wallet_mode(user_id, mode).await?;
    Ok(StatusCode::NO_CONTENT)
}
