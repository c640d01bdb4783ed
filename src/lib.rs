//! Ticketchain backend library.
//!
//! A ticket-NFT marketplace backend that mediates between a relational
//! database (users, events, tickets, listings) and an EVM chain hosting a
//! ticket collection contract and a marketplace contract. The relational
//! tables are a read cache; the chain is authoritative for token ownership
//! and listing state, and every cache write is derived from a confirmed
//! transaction receipt or an indexer-observed log.
//!
//! ## Modules
//!
//! - [`domain`] - Plain domain records (users, events, tickets, listings, chain facts)
//! - [`infra`] - Error taxonomy and PostgreSQL repositories (read-cache accessors)
//! - [`crypto`] - Key custody (AES-256-GCM encryption of signing keys at rest)
//! - [`chain`] - Chain gateway (provider, typed contract bindings, receipts)
//! - [`accounts`] - User registration and signer resolution
//! - [`issuance`] - Ticket issuance (event registration, admin mint, primary purchase)
//! - [`marketplace`] - Secondary market (list, buy, cancel, reconcile)
//! - [`indexer`] - Log-driven reconciliation of the listings cache
//! - [`api`] - HTTP boundary (thin request/response translation)

pub mod accounts;
pub mod api;
pub mod chain;
pub mod crypto;
pub mod domain;
pub mod indexer;
pub mod infra;
pub mod issuance;
pub mod marketplace;
pub mod migrations;
pub mod server;

// Re-export commonly used types
pub use chain::{ChainGateway, RpcChainGateway};
pub use crypto::KeyCustody;
pub use domain::{
    ChainListing, ChainTicketData, Listing, MintOutcome, SyncReport, Ticket, TicketedEvent,
    TxConfirmation, User,
};
pub use infra::{MarketError, Result};
