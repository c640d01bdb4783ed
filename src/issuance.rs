//! Ticket issuance: event registration, admin mints, primary purchases.
//!
//! The ordering invariant for every mutating operation: chain submission
//! strictly precedes the cache write, and the cache write commits only
//! after on-chain confirmation. The admin-mint path serializes on a row
//! lock; the primary-purchase path deliberately does not (the contract is
//! the ultimate arbiter of supply) and uses an atomic counter increment
//! instead of read-modify-write.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use sqlx::postgres::PgPool;
use tracing::{error, info, instrument};

use crate::accounts::resolve_signer;
use crate::chain::ChainGateway;
use crate::crypto::KeyCustody;
use crate::domain::{
    db_address, total_due, MintOutcome, NewEvent, NewTicket, TicketedEvent, TxConfirmation,
};
use crate::infra::{MarketError, PgEventStore, PgTicketStore, PgUserStore, Result};

/// Ticket issuance service
pub struct TicketIssuanceService {
    pool: PgPool,
    gateway: Arc<dyn ChainGateway>,
    custody: Arc<KeyCustody>,
    events: PgEventStore,
    users: PgUserStore,
}

impl TicketIssuanceService {
    pub fn new(pool: PgPool, gateway: Arc<dyn ChainGateway>, custody: Arc<KeyCustody>) -> Self {
        let events = PgEventStore::new(pool.clone());
        let users = PgUserStore::new(pool.clone());
        Self {
            pool,
            gateway,
            custody,
            events,
            users,
        }
    }

    pub async fn event(&self, event_id: i64) -> Result<TicketedEvent> {
        self.events.get(event_id).await
    }

    pub async fn list_events(&self) -> Result<Vec<TicketedEvent>> {
        self.events.list().await
    }

    /// Create an event and register it on-chain, awaiting confirmation.
    ///
    /// The row is committed first so a registration failure leaves a
    /// detectable NULL `registration_tx_hash` instead of losing the event;
    /// [`Self::register_event_onchain`] is the explicit retry.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_event(
        &self,
        input: NewEvent,
        creator: Address,
    ) -> Result<(TicketedEvent, TxConfirmation)> {
        if input.original_price < 0 {
            return Err(MarketError::Validation(
                "original_price must not be negative".to_string(),
            ));
        }
        if input.total_tickets <= 0 {
            return Err(MarketError::Validation(
                "total_tickets must be positive".to_string(),
            ));
        }

        let event = self.events.insert(&input).await?;
        info!(event_id = event.event_id, "event created, registering on-chain");

        let confirmation = self.register_event_onchain(event.event_id, creator).await?;
        let event = self.events.get(event.event_id).await?;
        Ok((event, confirmation))
    }

    /// Register (or re-register) an event on-chain from the minter wallet.
    #[instrument(skip(self))]
    pub async fn register_event_onchain(
        &self,
        event_id: i64,
        creator: Address,
    ) -> Result<TxConfirmation> {
        let event = self.events.get(event_id).await?;

        let confirmation = self
            .gateway
            .register_event(event_id, creator, event.original_price)
            .await?;

        self.events
            .set_registration_tx(event_id, &confirmation.tx_hash)
            .await?;

        info!(
            event_id,
            tx_hash = %confirmation.tx_hash,
            block = confirmation.block_number,
            "event registered on-chain"
        );
        Ok(confirmation)
    }

    /// Administrative mint from the privileged minter wallet.
    ///
    /// Locks the event row for the whole operation so capacity checks and
    /// the counter update are serialized; fails `SoldOut` before any chain
    /// call when capacity is exhausted.
    #[instrument(skip(self))]
    pub async fn mint_ticket(
        &self,
        event_id: i64,
        recipient: Address,
        user_id: Option<i64>,
    ) -> Result<MintOutcome> {
        let mut tx = self.pool.begin().await?;

        let event = PgEventStore::lock_for_update(&mut tx, event_id).await?;
        if event.sold_out() {
            // Rolls back on drop; no chain call was attempted.
            return Err(MarketError::SoldOut {
                event_id,
                total_tickets: event.total_tickets,
            });
        }

        let confirmation = self
            .gateway
            .mint_ticket(recipient, event_id, event.original_price)
            .await?;

        let token_id = minted_token_id(&confirmation, recipient)?;

        let ticket = NewTicket {
            token_id,
            nft_contract_address: db_address(self.gateway.ticket_contract()),
            owner_wallet_address: db_address(recipient),
            owner_user_id: user_id,
            event_id,
            original_price: event.original_price,
            issuance_date: confirmation.block_time,
            last_checked_block: confirmation.block_number,
        };

        let cache_write: Result<()> = async {
            PgEventStore::increment_minted_tx(&mut tx, event_id).await?;
            PgTicketStore::insert_tx(&mut tx, &ticket).await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = cache_write {
            // The mint is already on-chain; the rollback leaves a known
            // inconsistency window that must be loud enough to reconcile.
            error!(
                tx_hash = %confirmation.tx_hash,
                block = confirmation.block_number,
                token_id,
                error = %err,
                "cache write failed after confirmed mint"
            );
            return Err(MarketError::CacheDesync {
                operation: "mint_ticket",
                tx_hash: confirmation.tx_hash,
                block_number: confirmation.block_number,
                detail: err.to_string(),
            });
        }

        info!(event_id, token_id, tx_hash = %confirmation.tx_hash, "ticket minted");
        Ok(MintOutcome {
            tx_hash: confirmation.tx_hash,
            token_id,
            block_number: confirmation.block_number,
        })
    }

    /// Primary purchase: the buyer pays price plus live service fee and the
    /// contract mints straight to their wallet.
    #[instrument(skip(self))]
    pub async fn purchase_primary(&self, user_id: i64, event_id: i64) -> Result<MintOutcome> {
        // Availability check without a row lock: two concurrent purchases
        // may both pass and race to the contract, which enforces supply.
        let event = self.events.get(event_id).await?;
        if event.sold_out() {
            return Err(MarketError::SoldOut {
                event_id,
                total_tickets: event.total_tickets,
            });
        }

        let buyer = self.users.find_by_id(user_id).await?;
        let signer = resolve_signer(&buyer, &self.custody)?;
        let buyer_address = signer.address();

        let fee_bps = self.gateway.fee_basis_points().await?;
        let service_wallet = self.gateway.service_wallet().await?;
        if service_wallet == Address::ZERO {
            return Err(MarketError::Configuration(
                "marketplace service wallet is unset".to_string(),
            ));
        }

        let due = total_due(event.original_price, fee_bps)?;
        let required = U256::from(due as u64);

        let available = self.gateway.balance(buyer_address).await?;
        if available < required {
            return Err(MarketError::InsufficientFunds {
                required,
                available,
            });
        }

        let confirmation = self
            .gateway
            .buy_and_mint_ticket(signer, event_id, required)
            .await?;

        let token_id = minted_token_id(&confirmation, buyer_address)?;

        let ticket = NewTicket {
            token_id,
            nft_contract_address: db_address(self.gateway.ticket_contract()),
            owner_wallet_address: db_address(buyer_address),
            owner_user_id: Some(user_id),
            event_id,
            original_price: event.original_price,
            issuance_date: confirmation.block_time,
            last_checked_block: confirmation.block_number,
        };

        let cache_write: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            PgTicketStore::insert_tx(&mut tx, &ticket).await?;
            PgEventStore::increment_minted_tx(&mut tx, event_id).await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = cache_write {
            error!(
                tx_hash = %confirmation.tx_hash,
                block = confirmation.block_number,
                token_id,
                error = %err,
                "cache write failed after confirmed primary purchase"
            );
            return Err(MarketError::CacheDesync {
                operation: "purchase_primary",
                tx_hash: confirmation.tx_hash,
                block_number: confirmation.block_number,
                detail: err.to_string(),
            });
        }

        info!(
            user_id,
            event_id,
            token_id,
            total_paid = due,
            tx_hash = %confirmation.tx_hash,
            "primary purchase completed"
        );
        Ok(MintOutcome {
            tx_hash: confirmation.tx_hash,
            token_id,
            block_number: confirmation.block_number,
        })
    }
}

/// Recover the freshly minted token id from a confirmation's transfer logs.
///
/// A mint is a transfer from the zero address to the recipient. Absence
/// means the ABI and the deployed contract disagree; the mint already
/// happened on-chain, so this is fatal to the operation and flagged for
/// manual reconciliation.
fn minted_token_id(confirmation: &TxConfirmation, recipient: Address) -> Result<i64> {
    confirmation
        .transfers
        .iter()
        .find(|t| t.from == Address::ZERO && t.to == recipient)
        .map(|t| t.token_id)
        .ok_or_else(|| MarketError::TokenIdNotFound {
            tx_hash: confirmation.tx_hash.clone(),
        })
}
