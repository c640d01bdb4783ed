//! Error taxonomy for the marketplace service layer.
//!
//! Every service-layer failure is one of these variants; the HTTP boundary
//! switches on them exhaustively. Classes, in rough order of severity:
//! validation and precondition failures happen before any chain mutation
//! and are safe to retry after correction; `TransactionReverted` means gas
//! was spent and preconditions must be re-derived before any retry;
//! `ConfirmationTimeout` is an ambiguous outcome and the cache is left
//! untouched; `CacheDesync` means the chain mutated but the cache write
//! failed, which must be surfaced with enough detail to reconcile.

use alloy::primitives::U256;
use thiserror::Error;

/// Errors that can occur in the marketplace service layer
#[derive(Error, Debug)]
pub enum MarketError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// User not found
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// Event not found
    #[error("event not found: {0}")]
    EventNotFound(i64),

    /// Ticket not found in the cache
    #[error("ticket not found: token {0}")]
    TicketNotFound(i64),

    /// No listing row for the token
    #[error("no listing for token {0}")]
    ListingNotFound(i64),

    /// Listing exists but is not active (already sold or cancelled)
    #[error("listing for token {0} is not active")]
    ListingNotActive(i64),

    /// Event capacity exhausted
    #[error("event {event_id} is sold out ({total_tickets} tickets minted)")]
    SoldOut { event_id: i64, total_tickets: i32 },

    /// Listing price outside the allowed range
    #[error("invalid price {price}: must be positive and at most {ceiling}")]
    InvalidPrice { price: i64, ceiling: i64 },

    /// Malformed or unexpected address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Input rejected before any chain or cache access
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller is not the on-chain owner of the token
    #[error("caller is not the on-chain owner of token {token_id}")]
    NotOwner { token_id: i64 },

    /// Caller is not the seller of the listing
    #[error("caller is not the seller of the listing for token {token_id}")]
    NotSeller { token_id: i64 },

    /// Buying one's own listing
    #[error("cannot buy your own listing for token {0}")]
    SelfTrade(i64),

    /// On-chain balance does not cover price plus fee
    #[error("insufficient funds: required {required} wei, available {available} wei")]
    InsufficientFunds { required: U256, available: U256 },

    /// Transaction was mined but reverted; gas is spent and chain state has
    /// moved, so callers must re-validate preconditions before any retry
    #[error("transaction {tx_hash} reverted on-chain")]
    TransactionReverted { tx_hash: String },

    /// The broadcast transaction did not confirm within the wait bound
    #[error("timed out waiting for confirmation of transaction {tx_hash}")]
    ConfirmationTimeout { tx_hash: String },

    /// A confirmed mint receipt carried no usable transfer log; the mint
    /// happened on-chain and requires manual reconciliation
    #[error("minted token id not found in receipt logs of transaction {tx_hash}")]
    TokenIdNotFound { tx_hash: String },

    /// Cache write failed after the chain already mutated
    #[error(
        "cache update failed after confirmed transaction {tx_hash} \
         (block {block_number}) during {operation}: {detail}"
    )]
    CacheDesync {
        operation: &'static str,
        tx_hash: String,
        block_number: i64,
        detail: String,
    },

    /// Signing credentials could not be recovered; deliberately carries no
    /// cipher detail
    #[error("credentials unavailable")]
    CredentialsUnavailable,

    /// Decrypted key does not derive the stored wallet address
    #[error("stored wallet address {stored} does not match derived address {derived}")]
    AddressMismatch { stored: String, derived: String },

    /// Encryption error (key custody, excluding decrypt-for-signing paths)
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Provider / RPC transport error
    #[error("provider error: {0}")]
    Provider(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;
