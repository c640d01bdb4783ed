//! User repository.

use sqlx::postgres::PgPool;

use crate::domain::{User, WalletMode};
use crate::infra::{MarketError, Result};

/// PostgreSQL-backed user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly registered user with their custody cipher record.
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        wallet_address: &str,
        encrypted_private_key: &str,
    ) -> Result<User> {
        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash, wallet_address, encrypted_private_key)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(wallet_address)
        .bind(encrypted_private_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<User> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        user.ok_or(MarketError::UserNotFound(user_id))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Look up the user custodying a wallet address, if any. Addresses are
    /// stored lowercase but compared case-insensitively for robustness
    /// against externally supplied checksummed forms.
    pub async fn find_by_address(&self, wallet_address: &str) -> Result<Option<User>> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE LOWER(wallet_address) = LOWER($1)")
                .bind(wallet_address)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    pub async fn set_wallet_mode(&self, user_id: i64, mode: WalletMode) -> Result<()> {
        let result = sqlx::query("UPDATE users SET wallet_mode = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(mode.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::UserNotFound(user_id));
        }
        Ok(())
    }

    pub async fn set_roles(&self, user_id: i64, is_admin: bool, is_creator: bool) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET is_admin = $2, is_creator = $3 WHERE user_id = $1")
                .bind(user_id)
                .bind(is_admin)
                .bind(is_creator)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::UserNotFound(user_id));
        }
        Ok(())
    }
}
