//! Operational endpoints: indexer trigger and owner reconciliation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info};

use crate::api::ApiError;
use crate::domain::ReconcileReport;
use crate::server::AppState;

/// Kick off a log sync in the background and return immediately.
pub async fn trigger_sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let indexer = state.indexer.clone();
    tokio::spawn(async move {
        match indexer.sync().await {
            Ok(report) => info!(
                scanned_to_block = report.scanned_to_block,
                events_processed = report.events_processed,
                "background sync complete"
            ),
            Err(err) => error!(error = %err, "background sync failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "sync started" })),
    ))
}

pub async fn reconcile_owner(
    State(state): State<AppState>,
    Path(token_id): Path<i64>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = state.marketplace.reconcile_token_owner(token_id).await?;
    Ok(Json(report))
}
