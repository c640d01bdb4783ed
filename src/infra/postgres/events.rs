//! Event repository: capacity counters and the admin-mint row lock.

use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::domain::{NewEvent, TicketedEvent};
use crate::infra::{MarketError, Result};

/// PostgreSQL-backed event store
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, input: &NewEvent) -> Result<TicketedEvent> {
        let event: TicketedEvent = sqlx::query_as(
            r#"
            INSERT INTO events (name, description, date, location, original_price, total_tickets)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.date)
        .bind(&input.location)
        .bind(input.original_price)
        .bind(input.total_tickets)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    pub async fn get(&self, event_id: i64) -> Result<TicketedEvent> {
        let event: Option<TicketedEvent> =
            sqlx::query_as("SELECT * FROM events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;

        event.ok_or(MarketError::EventNotFound(event_id))
    }

    pub async fn list(&self) -> Result<Vec<TicketedEvent>> {
        let events: Vec<TicketedEvent> = sqlx::query_as("SELECT * FROM events ORDER BY date ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    pub async fn set_registration_tx(&self, event_id: i64, tx_hash: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE events SET registration_tx_hash = $2 WHERE event_id = $1")
                .bind(event_id)
                .bind(tx_hash)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::EventNotFound(event_id));
        }
        Ok(())
    }

    /// Lock the event row so concurrent admin mints serialize on it.
    pub async fn lock_for_update(
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
    ) -> Result<TicketedEvent> {
        let event: Option<TicketedEvent> =
            sqlx::query_as("SELECT * FROM events WHERE event_id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut **tx)
                .await?;

        event.ok_or(MarketError::EventNotFound(event_id))
    }

    /// Atomic counter bump. The `CHECK (tickets_minted <= total_tickets)`
    /// constraint turns a genuine supply divergence into a database error
    /// instead of silent corruption.
    pub async fn increment_minted_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE events SET tickets_minted = tickets_minted + 1 WHERE event_id = $1")
                .bind(event_id)
                .execute(&mut **tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::EventNotFound(event_id));
        }
        Ok(())
    }
}
