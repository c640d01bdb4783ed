//! Ticketed events (concerts, matches, ...) and their mint counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event whose tickets are minted as NFTs.
///
/// `tickets_minted` is a monotonic counter and may only be incremented in
/// the same database transaction that records a confirmed mint. The schema
/// enforces `tickets_minted <= total_tickets`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketedEvent {
    pub event_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: Option<String>,
    /// Authoritative price ceiling in wei (minor units).
    pub original_price: i64,
    pub total_tickets: i32,
    pub tickets_minted: i32,
    /// Hash of the confirmed on-chain registration, NULL until registered.
    pub registration_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TicketedEvent {
    pub fn sold_out(&self) -> bool {
        self.tickets_minted >= self.total_tickets
    }
}

/// Input for creating a new event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: Option<String>,
    pub original_price: i64,
    pub total_tickets: i32,
}
