//! Ticket rows: the cached view of minted token ownership.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A minted ticket token mirrored from chain state.
///
/// `owner_user_id` is NULL when the token is held by a wallet this backend
/// does not custody. Owner fields always reflect the most recent reconciled
/// on-chain transfer; `last_checked_block` marks cache freshness.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub token_id: i64,
    pub nft_contract_address: String,
    pub owner_wallet_address: String,
    pub owner_user_id: Option<i64>,
    pub event_id: i64,
    pub original_price: i64,
    pub issuance_date: DateTime<Utc>,
    pub is_listed: bool,
    pub last_checked_block: i64,
}

/// A freshly minted ticket about to be inserted from a confirmed receipt.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub token_id: i64,
    pub nft_contract_address: String,
    pub owner_wallet_address: String,
    pub owner_user_id: Option<i64>,
    pub event_id: i64,
    pub original_price: i64,
    pub issuance_date: DateTime<Utc>,
    pub last_checked_block: i64,
}
