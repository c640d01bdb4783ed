//! Secondary-market listings: the cached view of marketplace contract state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A secondary-market offer for a specific token.
///
/// At most one row exists per (contract, token); `is_active` flips to false
/// exactly once per listing lifetime, on sale or cancellation, and a
/// re-listing reactivates the row clearing both timestamps.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Listing {
    pub listing_id: i64,
    pub token_id: i64,
    pub nft_contract_address: String,
    pub seller_address: String,
    pub seller_user_id: Option<i64>,
    pub price: i64,
    pub event_id: Option<i64>,
    pub original_price: Option<i64>,
    pub is_active: bool,
    pub listed_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_checked_block: i64,
}

/// Upsert input for an active listing, derived from a confirmed receipt or
/// an indexer-observed `ItemListed` log.
#[derive(Debug, Clone)]
pub struct ActiveListingUpsert {
    pub token_id: i64,
    pub nft_contract_address: String,
    pub seller_address: String,
    pub seller_user_id: Option<i64>,
    pub price: i64,
    pub event_id: Option<i64>,
    pub original_price: Option<i64>,
    pub listed_at: DateTime<Utc>,
    pub block_number: i64,
}
