//! Chain-derived facts crossing the gateway boundary.
//!
//! Everything here is decoded from receipts or logs by the gateway so that
//! services (and their test doubles) never touch provider types.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Canonical lowercase-hex form of an address for storage and comparison.
pub fn db_address(address: Address) -> String {
    format!("{address:#x}")
}

/// A confirmed transaction: hash, block coordinates, and the ERC-721
/// transfer logs the ticket contract emitted in it.
#[derive(Debug, Clone)]
pub struct TxConfirmation {
    pub tx_hash: String,
    pub block_number: i64,
    pub block_time: DateTime<Utc>,
    pub transfers: Vec<TokenTransfer>,
}

/// A decoded ERC-721 `Transfer` log. A mint has `from == Address::ZERO`.
#[derive(Debug, Clone, Copy)]
pub struct TokenTransfer {
    pub from: Address,
    pub to: Address,
    pub token_id: i64,
}

/// `ticketData(tokenId)` as the ticket contract reports it.
#[derive(Debug, Clone, Copy)]
pub struct ChainTicketData {
    pub event_id: i64,
    pub original_price: i64,
}

/// `listings(tokenId)` as the marketplace contract reports it.
#[derive(Debug, Clone, Copy)]
pub struct ChainListing {
    pub seller: Address,
    pub price: i64,
    pub active: bool,
}

/// Decoded `ItemListed` log.
#[derive(Debug, Clone, Copy)]
pub struct ListedLog {
    pub token_id: i64,
    pub seller: Address,
    pub price: i64,
    pub block_number: i64,
}

/// Decoded `ItemSold` log.
#[derive(Debug, Clone, Copy)]
pub struct SoldLog {
    pub token_id: i64,
    pub seller: Address,
    pub buyer: Address,
    pub price: i64,
    pub block_number: i64,
}

/// Decoded `ListingCancelled` log.
#[derive(Debug, Clone, Copy)]
pub struct CancelledLog {
    pub token_id: i64,
    pub seller: Address,
    pub block_number: i64,
}

/// The three marketplace log kinds fetched for one block range.
#[derive(Debug, Clone, Default)]
pub struct MarketLogPage {
    pub listed: Vec<ListedLog>,
    pub sold: Vec<SoldLog>,
    pub cancelled: Vec<CancelledLog>,
}

impl MarketLogPage {
    pub fn len(&self) -> usize {
        self.listed.len() + self.sold.len() + self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one indexer run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SyncReport {
    pub scanned_to_block: i64,
    pub events_processed: usize,
}

/// Result of a mint (admin mint or primary purchase).
#[derive(Debug, Clone, Serialize)]
pub struct MintOutcome {
    pub tx_hash: String,
    pub token_id: i64,
    pub block_number: i64,
}

/// Result of listing a ticket for sale (two confirmed transactions).
#[derive(Debug, Clone, Serialize)]
pub struct ListOutcome {
    pub approve_tx_hash: String,
    pub list_tx_hash: String,
    pub token_id: i64,
}

/// Result of a secondary-market purchase.
#[derive(Debug, Clone, Serialize)]
pub struct SaleOutcome {
    pub tx_hash: String,
    pub token_id: i64,
    pub total_paid: i64,
    pub block_number: i64,
}

/// Result of a listing cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub tx_hash: String,
    pub token_id: i64,
}

/// Result of reconciling a ticket's cached owner against `ownerOf`.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub token_id: i64,
    pub previous_owner: String,
    pub current_owner: String,
    pub changed: bool,
}
