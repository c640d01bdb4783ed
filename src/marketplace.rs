//! Secondary-market operations: list, buy, cancel, withdraw, reconcile.
//!
//! Every mutating operation follows the same shape: on-chain action,
//! await confirmation, status check, cache write — with the cache write
//! committed only after confirmed success. The database is consulted first
//! only to fail fast; the chain is re-validated immediately before money
//! moves because the cache may be stale.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use sqlx::postgres::PgPool;
use tracing::{error, info, instrument};

use crate::accounts::resolve_signer;
use crate::chain::ChainGateway;
use crate::crypto::KeyCustody;
use crate::domain::{
    db_address, total_due, ActiveListingUpsert, CancelOutcome, ListOutcome, Listing,
    ReconcileReport, SaleOutcome, Ticket, TxConfirmation, User,
};
use crate::infra::{
    MarketError, PgListingStore, PgTicketStore, PgUserStore, Result,
};

/// Secondary-market service
pub struct MarketplaceService {
    pool: PgPool,
    gateway: Arc<dyn ChainGateway>,
    custody: Arc<KeyCustody>,
    users: PgUserStore,
    tickets: PgTicketStore,
    listings: PgListingStore,
}

impl MarketplaceService {
    pub fn new(pool: PgPool, gateway: Arc<dyn ChainGateway>, custody: Arc<KeyCustody>) -> Self {
        let users = PgUserStore::new(pool.clone());
        let tickets = PgTicketStore::new(pool.clone());
        let listings = PgListingStore::new(pool.clone());
        Self {
            pool,
            gateway,
            custody,
            users,
            tickets,
            listings,
        }
    }

    fn contract(&self) -> String {
        db_address(self.gateway.ticket_contract())
    }

    /// Read-cache accessor: active listings, newest first.
    pub async fn active_listings(&self) -> Result<Vec<Listing>> {
        self.listings.active().await
    }

    /// Read-cache accessor: tickets held by a wallet address.
    pub async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>> {
        self.tickets.by_owner(owner).await
    }

    /// List a ticket for sale: approve, list, then mirror into the cache.
    #[instrument(skip(self))]
    pub async fn list_item_for_sale(
        &self,
        user_id: i64,
        token_id: i64,
        price: i64,
    ) -> Result<ListOutcome> {
        let user = self.users.find_by_id(user_id).await?;
        let user_address = parse_wallet(&user)?;

        let owner = self.gateway.owner_of(token_id).await?;
        if owner != user_address {
            return Err(MarketError::NotOwner { token_id });
        }

        let data = self.gateway.ticket_data(token_id).await?;
        if price <= 0 || price > data.original_price {
            return Err(MarketError::InvalidPrice {
                price,
                ceiling: data.original_price,
            });
        }

        let signer = resolve_signer(&user, &self.custody)?;

        let approval = self
            .gateway
            .approve_marketplace(signer.clone(), token_id)
            .await?;
        info!(token_id, tx_hash = %approval.tx_hash, "marketplace approved for token");

        let listed = self.gateway.list_item(signer, token_id, price).await?;

        let upsert = ActiveListingUpsert {
            token_id,
            nft_contract_address: self.contract(),
            seller_address: user.wallet_address.clone(),
            seller_user_id: Some(user_id),
            price,
            event_id: Some(data.event_id),
            original_price: Some(data.original_price),
            listed_at: listed.block_time,
            block_number: listed.block_number,
        };

        let contract = self.contract();
        let cache_write: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            PgListingStore::upsert_active_tx(&mut tx, &upsert).await?;
            PgTicketStore::set_listed_tx(&mut tx, &contract, token_id, true, listed.block_number)
                .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = cache_write {
            return Err(self.desync("list_item_for_sale", &listed, err));
        }

        info!(user_id, token_id, price, tx_hash = %listed.tx_hash, "ticket listed for sale");
        Ok(ListOutcome {
            approve_tx_hash: approval.tx_hash,
            list_tx_hash: listed.tx_hash,
            token_id,
        })
    }

    /// Buy a listed ticket: cache fast-fail, on-chain re-validation, pay,
    /// then deactivate the listing and reassign the ticket.
    #[instrument(skip(self))]
    pub async fn buy_listed_item(&self, buyer_user_id: i64, token_id: i64) -> Result<SaleOutcome> {
        let buyer = self.users.find_by_id(buyer_user_id).await?;
        let contract = self.contract();

        // DB first for a cheap fast-fail; the chain is checked again below.
        let cached = self.listings.active_by_token(&contract, token_id).await?;
        if buyer
            .wallet_address
            .eq_ignore_ascii_case(&cached.seller_address)
        {
            return Err(MarketError::SelfTrade(token_id));
        }

        // The cache may be stale; re-validate against the contract
        // immediately before sending payment.
        let onchain = self.gateway.listing(token_id).await?;
        if !onchain.active
            || !db_address(onchain.seller).eq_ignore_ascii_case(&cached.seller_address)
        {
            return Err(MarketError::ListingNotActive(token_id));
        }

        let signer = resolve_signer(&buyer, &self.custody)?;
        let buyer_address = signer.address();
        if buyer_address == onchain.seller {
            return Err(MarketError::SelfTrade(token_id));
        }

        let fee_bps = self.gateway.fee_basis_points().await?;
        let due = total_due(onchain.price, fee_bps)?;
        let required = U256::from(due as u64);

        let available = self.gateway.balance(buyer_address).await?;
        if available < required {
            return Err(MarketError::InsufficientFunds {
                required,
                available,
            });
        }

        let confirmation = self.gateway.buy_item(signer, token_id, required).await?;

        let cache_write: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            PgListingStore::mark_sold_tx(
                &mut tx,
                &contract,
                token_id,
                confirmation.block_time,
                confirmation.block_number,
            )
            .await?;
            PgTicketStore::reassign_owner_tx(
                &mut tx,
                &contract,
                token_id,
                &db_address(buyer_address),
                Some(buyer_user_id),
                confirmation.block_number,
            )
            .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = cache_write {
            return Err(self.desync("buy_listed_item", &confirmation, err));
        }

        info!(
            buyer_user_id,
            token_id,
            total_paid = due,
            tx_hash = %confirmation.tx_hash,
            "secondary purchase completed"
        );
        Ok(SaleOutcome {
            tx_hash: confirmation.tx_hash,
            token_id,
            total_paid: due,
            block_number: confirmation.block_number,
        })
    }

    /// Cancel an active listing owned by the caller.
    #[instrument(skip(self))]
    pub async fn cancel_listing_for_user(
        &self,
        user_id: i64,
        token_id: i64,
    ) -> Result<CancelOutcome> {
        let user = self.users.find_by_id(user_id).await?;
        let user_address = parse_wallet(&user)?;

        let onchain = self.gateway.listing(token_id).await?;
        if !onchain.active {
            return Err(MarketError::ListingNotActive(token_id));
        }
        if onchain.seller != user_address {
            return Err(MarketError::NotSeller { token_id });
        }

        let signer = resolve_signer(&user, &self.custody)?;
        let confirmation = self.gateway.cancel_listing(signer, token_id).await?;

        let contract = self.contract();
        let cache_write: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            PgListingStore::mark_cancelled_tx(
                &mut tx,
                &contract,
                token_id,
                confirmation.block_time,
                confirmation.block_number,
            )
            .await?;
            PgTicketStore::set_listed_tx(
                &mut tx,
                &contract,
                token_id,
                false,
                confirmation.block_number,
            )
            .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = cache_write {
            return Err(self.desync("cancel_listing_for_user", &confirmation, err));
        }

        info!(user_id, token_id, tx_hash = %confirmation.tx_hash, "listing cancelled");
        Ok(CancelOutcome {
            tx_hash: confirmation.tx_hash,
            token_id,
        })
    }

    /// Mirror a listing created by an externally-signed transaction the
    /// service never saw. Only chain state is trusted: the notification is
    /// a hint, the contract is the source.
    #[instrument(skip(self))]
    pub async fn record_external_listing(&self, token_id: i64) -> Result<Listing> {
        let onchain = self.gateway.listing(token_id).await?;
        if !onchain.active {
            return Err(MarketError::ListingNotActive(token_id));
        }

        let seller_address = db_address(onchain.seller);
        let seller = self.users.find_by_address(&seller_address).await?;
        let data = self.gateway.ticket_data(token_id).await.ok();

        let head = self.gateway.head_block().await?;
        let listed_at = self.gateway.block_time(head).await?;

        let contract = self.contract();
        let upsert = ActiveListingUpsert {
            token_id,
            nft_contract_address: contract.clone(),
            seller_address,
            seller_user_id: seller.map(|u| u.user_id),
            price: onchain.price,
            event_id: data.map(|d| d.event_id),
            original_price: data.map(|d| d.original_price),
            listed_at,
            block_number: head,
        };

        let mut tx = self.pool.begin().await?;
        PgListingStore::upsert_active_tx(&mut tx, &upsert).await?;
        // The token may be externally held and absent from the cache; the
        // flag update is a no-op in that case.
        PgTicketStore::set_listed_tx(&mut tx, &contract, token_id, true, head).await?;
        tx.commit().await?;

        self.listings
            .by_token(&contract, token_id)
            .await?
            .ok_or(MarketError::ListingNotFound(token_id))
    }

    /// Move a custodied ticket to an arbitrary wallet (typically the
    /// user's external one) and mirror the transfer into the cache.
    #[instrument(skip(self))]
    pub async fn withdraw_ticket(
        &self,
        user_id: i64,
        to: Address,
        token_id: i64,
    ) -> Result<ReconcileReport> {
        let user = self.users.find_by_id(user_id).await?;
        let user_address = parse_wallet(&user)?;

        let owner = self.gateway.owner_of(token_id).await?;
        if owner != user_address {
            return Err(MarketError::NotOwner { token_id });
        }

        let signer = resolve_signer(&user, &self.custody)?;
        let confirmation = self.gateway.transfer_token(signer, to, token_id).await?;

        let new_owner = db_address(to);
        let recipient = self.users.find_by_address(&new_owner).await?;

        let contract = self.contract();
        let cache_write: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            PgTicketStore::reassign_owner_tx(
                &mut tx,
                &contract,
                token_id,
                &new_owner,
                recipient.as_ref().map(|u| u.user_id),
                confirmation.block_number,
            )
            .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = cache_write {
            return Err(self.desync("withdraw_ticket", &confirmation, err));
        }

        info!(user_id, token_id, to = %new_owner, tx_hash = %confirmation.tx_hash, "ticket withdrawn");
        Ok(ReconcileReport {
            token_id,
            previous_owner: user.wallet_address,
            current_owner: new_owner,
            changed: true,
        })
    }

    /// Reconcile one ticket's cached owner against `ownerOf`. Covers
    /// transfers signed entirely outside this backend.
    #[instrument(skip(self))]
    pub async fn reconcile_token_owner(&self, token_id: i64) -> Result<ReconcileReport> {
        let contract = self.contract();
        let ticket = self.tickets.by_token(&contract, token_id).await?;

        let owner = self.gateway.owner_of(token_id).await?;
        let current_owner = db_address(owner);

        if ticket
            .owner_wallet_address
            .eq_ignore_ascii_case(&current_owner)
        {
            return Ok(ReconcileReport {
                token_id,
                previous_owner: ticket.owner_wallet_address.clone(),
                current_owner,
                changed: false,
            });
        }

        let holder = self.users.find_by_address(&current_owner).await?;
        let head = self.gateway.head_block().await?;

        let mut tx = self.pool.begin().await?;
        PgTicketStore::reassign_owner_tx(
            &mut tx,
            &contract,
            token_id,
            &current_owner,
            holder.map(|u| u.user_id),
            head,
        )
        .await?;
        tx.commit().await?;

        info!(
            token_id,
            previous = %ticket.owner_wallet_address,
            current = %current_owner,
            "ticket owner reconciled from chain"
        );
        Ok(ReconcileReport {
            token_id,
            previous_owner: ticket.owner_wallet_address,
            current_owner,
            changed: true,
        })
    }

    fn desync(
        &self,
        operation: &'static str,
        confirmation: &TxConfirmation,
        err: MarketError,
    ) -> MarketError {
        error!(
            operation,
            tx_hash = %confirmation.tx_hash,
            block = confirmation.block_number,
            error = %err,
            "cache write failed after confirmed transaction"
        );
        MarketError::CacheDesync {
            operation,
            tx_hash: confirmation.tx_hash.clone(),
            block_number: confirmation.block_number,
            detail: err.to_string(),
        }
    }
}

fn parse_wallet(user: &User) -> Result<Address> {
    user.wallet_address
        .parse()
        .map_err(|_| MarketError::InvalidAddress(user.wallet_address.clone()))
}
