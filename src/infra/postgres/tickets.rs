//! Ticket repository: the cached ownership mirror.

use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::domain::{NewTicket, Ticket};
use crate::infra::{MarketError, Result};

/// PostgreSQL-backed ticket store
#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn by_token(&self, contract: &str, token_id: i64) -> Result<Ticket> {
        let ticket: Option<Ticket> = sqlx::query_as(
            "SELECT * FROM tickets WHERE nft_contract_address = $1 AND token_id = $2",
        )
        .bind(contract)
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        ticket.ok_or(MarketError::TicketNotFound(token_id))
    }

    /// Read-cache accessor: all tickets held by a wallet address.
    pub async fn by_owner(&self, owner_wallet_address: &str) -> Result<Vec<Ticket>> {
        let tickets: Vec<Ticket> = sqlx::query_as(
            r#"
            SELECT * FROM tickets
            WHERE LOWER(owner_wallet_address) = LOWER($1)
            ORDER BY token_id ASC
            "#,
        )
        .bind(owner_wallet_address)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Insert a freshly minted ticket inside the mint transaction.
    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, ticket: &NewTicket) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (
                token_id, nft_contract_address, owner_wallet_address, owner_user_id,
                event_id, original_price, issuance_date, is_listed, last_checked_block
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)
            "#,
        )
        .bind(ticket.token_id)
        .bind(&ticket.nft_contract_address)
        .bind(&ticket.owner_wallet_address)
        .bind(ticket.owner_user_id)
        .bind(ticket.event_id)
        .bind(ticket.original_price)
        .bind(ticket.issuance_date)
        .bind(ticket.last_checked_block)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Flip the listed flag from a confirmed list/cancel receipt.
    pub async fn set_listed_tx(
        tx: &mut Transaction<'_, Postgres>,
        contract: &str,
        token_id: i64,
        is_listed: bool,
        block_number: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tickets SET is_listed = $3, last_checked_block = $4
            WHERE nft_contract_address = $1 AND token_id = $2
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .bind(is_listed)
        .bind(block_number)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Reassign ownership from a confirmed sale or transfer receipt.
    pub async fn reassign_owner_tx(
        tx: &mut Transaction<'_, Postgres>,
        contract: &str,
        token_id: i64,
        owner_wallet_address: &str,
        owner_user_id: Option<i64>,
        block_number: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tickets
            SET owner_wallet_address = $3,
                owner_user_id = $4,
                is_listed = FALSE,
                last_checked_block = $5
            WHERE nft_contract_address = $1 AND token_id = $2
            "#,
        )
        .bind(contract)
        .bind(token_id)
        .bind(owner_wallet_address)
        .bind(owner_user_id)
        .bind(block_number)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// How many mints for an event the cache knows about. Comparing this
    /// against `events.tickets_minted` exposes the inconsistency window a
    /// failed cache write leaves behind.
    pub async fn count_for_event(&self, event_id: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }
}
