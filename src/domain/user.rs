//! User records and wallet-usage preference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a user prefers to transact: with the server-custodied wallet or an
/// external browser wallet the server never holds keys for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    Internal,
    External,
}

impl WalletMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletMode::Internal => "internal",
            WalletMode::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "internal" => Some(WalletMode::Internal),
            "external" => Some(WalletMode::External),
            _ => None,
        }
    }
}

/// A registered user with a server-custodied wallet.
///
/// `encrypted_private_key` holds the custody cipher record
/// (`iv:tag:ciphertext`, hex); the plaintext key never leaves
/// [`crate::crypto::KeyCustody`] except inside signer resolution.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub wallet_address: String,
    #[serde(skip_serializing)]
    pub encrypted_private_key: String,
    pub wallet_mode: String,
    pub is_admin: bool,
    pub is_creator: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn wallet_mode(&self) -> WalletMode {
        WalletMode::parse(&self.wallet_mode).unwrap_or(WalletMode::Internal)
    }
}
