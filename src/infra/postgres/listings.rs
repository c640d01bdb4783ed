//! Listing repository: the secondary-market mirror.
//!
//! The upsert is keyed on the (contract, token) unique constraint so a
//! re-listing reactivates the existing row, and the sold/cancelled updates
//! are conditioned on `is_active` so stale or replayed logs cannot
//! reactivate or double-close a listing.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::domain::{ActiveListingUpsert, Listing};
use crate::infra::{MarketError, Result};

/// PostgreSQL-backed listing store
#[derive(Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read-cache accessor: all active listings, newest first.
    pub async fn active(&self) -> Result<Vec<Listing>> {
        let listings: Vec<Listing> =
            sqlx::query_as("SELECT * FROM listings WHERE is_active ORDER BY listed_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(listings)
    }

    pub async fn by_token(&self, contract: &str, token_id: i64) -> Result<Option<Listing>> {
        let listing: Option<Listing> = sqlx::query_as(
            "SELECT * FROM listings WHERE nft_contract_address = $1 AND token_id = $2",
        )
        .bind(contract)
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    /// Fast-fail lookup for purchases: the row must exist and be active.
    pub async fn active_by_token(&self, contract: &str, token_id: i64) -> Result<Listing> {
        match self.by_token(contract, token_id).await? {
            None => Err(MarketError::ListingNotFound(token_id)),
            Some(listing) if !listing.is_active => Err(MarketError::ListingNotActive(token_id)),
            Some(listing) => Ok(listing),
        }
    }

    /// Highest block any cached listing has been checked against. The
    /// indexer derives its start block from this defensively each run.
    pub async fn last_checked_block(&self) -> Result<Option<i64>> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(last_checked_block) FROM listings")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    /// Upsert an active listing inside a service-owned transaction.
    pub async fn upsert_active_tx(
        tx: &mut Transaction<'_, Postgres>,
        upsert: &ActiveListingUpsert,
    ) -> Result<()> {
        sqlx::query(Self::UPSERT_ACTIVE_SQL)
            .bind(upsert.token_id)
            .bind(&upsert.nft_contract_address)
            .bind(&upsert.seller_address)
            .bind(upsert.seller_user_id)
            .bind(upsert.price)
            .bind(upsert.event_id)
            .bind(upsert.original_price)
            .bind(upsert.listed_at)
            .bind(upsert.block_number)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Upsert an active listing from an indexer-observed log. Idempotent:
    /// replaying the same log converges to the same row.
    pub async fn upsert_active(&self, upsert: &ActiveListingUpsert) -> Result<()> {
        sqlx::query(Self::UPSERT_ACTIVE_SQL)
            .bind(upsert.token_id)
            .bind(&upsert.nft_contract_address)
            .bind(&upsert.seller_address)
            .bind(upsert.seller_user_id)
            .bind(upsert.price)
            .bind(upsert.event_id)
            .bind(upsert.original_price)
            .bind(upsert.listed_at)
            .bind(upsert.block_number)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    const UPSERT_ACTIVE_SQL: &'static str = r#"
        INSERT INTO listings (
            token_id, nft_contract_address, seller_address, seller_user_id,
            price, event_id, original_price, is_active,
            listed_at, sold_at, cancelled_at, last_checked_block
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, NULL, NULL, $9)
        ON CONFLICT (nft_contract_address, token_id)
        DO UPDATE SET
            price = EXCLUDED.price,
            seller_address = EXCLUDED.seller_address,
            seller_user_id = EXCLUDED.seller_user_id,
            is_active = TRUE,
            listed_at = EXCLUDED.listed_at,
            sold_at = NULL,
            cancelled_at = NULL,
            last_checked_block = EXCLUDED.last_checked_block
    "#;

    /// Close the active listing as sold. Returns whether a row changed;
    /// conditioning on `is_active` keeps out-of-order logs harmless.
    pub async fn mark_sold_tx(
        tx: &mut Transaction<'_, Postgres>,
        contract: &str,
        token_id: i64,
        sold_at: DateTime<Utc>,
        block_number: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = FALSE, sold_at = $3, last_checked_block = $4
            WHERE nft_contract_address = $1 AND token_id = $2 AND is_active
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .bind(sold_at)
        .bind(block_number)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pool variant of [`Self::mark_sold_tx`] for the indexer.
    pub async fn mark_sold(
        &self,
        contract: &str,
        token_id: i64,
        sold_at: DateTime<Utc>,
        block_number: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = FALSE, sold_at = $3, last_checked_block = $4
            WHERE nft_contract_address = $1 AND token_id = $2 AND is_active
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .bind(sold_at)
        .bind(block_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Close the active listing as cancelled.
    pub async fn mark_cancelled_tx(
        tx: &mut Transaction<'_, Postgres>,
        contract: &str,
        token_id: i64,
        cancelled_at: DateTime<Utc>,
        block_number: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = FALSE, cancelled_at = $3, last_checked_block = $4
            WHERE nft_contract_address = $1 AND token_id = $2 AND is_active
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .bind(cancelled_at)
        .bind(block_number)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pool variant of [`Self::mark_cancelled_tx`] for the indexer.
    pub async fn mark_cancelled(
        &self,
        contract: &str,
        token_id: i64,
        cancelled_at: DateTime<Utc>,
        block_number: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET is_active = FALSE, cancelled_at = $3, last_checked_block = $4
            WHERE nft_contract_address = $1 AND token_id = $2 AND is_active
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .bind(cancelled_at)
        .bind(block_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Invariant probe: number of active rows for one (contract, token).
    /// The unique constraint should make any value above 1 impossible.
    pub async fn active_count_for_token(&self, contract: &str, token_id: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM listings
            WHERE nft_contract_address = $1 AND token_id = $2 AND is_active
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}
