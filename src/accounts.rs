//! User accounts: registration with server-side key generation, wallet
//! preferences, and signer resolution.
//!
//! Registration generates the key pair server-side and stores only the
//! custody cipher record. Signer resolution is the inverse path: decrypt,
//! rebuild the signing identity, and verify the derived address against
//! the stored one as a defense against record corruption. Decryption
//! failures surface as a generic `CredentialsUnavailable` so no cipher
//! detail reaches callers.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use sqlx::postgres::PgPool;
use tracing::{info, instrument, warn};

use crate::crypto::KeyCustody;
use crate::domain::{db_address, User, WalletMode};
use crate::infra::{MarketError, PgUserStore, Result};

/// Account registration and credential recovery
pub struct AccountService {
    users: PgUserStore,
    custody: Arc<KeyCustody>,
}

impl AccountService {
    pub fn new(pool: PgPool, custody: Arc<KeyCustody>) -> Self {
        Self {
            users: PgUserStore::new(pool),
            custody,
        }
    }

    /// Register a user, generating and custodying a fresh key pair.
    ///
    /// Password hashing belongs to the HTTP boundary; this layer stores
    /// the hash it is handed. The plaintext private key exists only inside
    /// this function.
    #[instrument(skip(self, password_hash))]
    pub async fn register_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let signer = PrivateKeySigner::random();
        let wallet_address = db_address(signer.address());
        let key_hex = format!("0x{}", hex::encode(signer.to_bytes()));

        let record = self
            .custody
            .encrypt(key_hex.as_bytes())
            .map_err(|e| MarketError::Encryption(e.to_string()))?;

        let user = self
            .users
            .insert(username, password_hash, &wallet_address, &record)
            .await?;

        info!(user_id = user.user_id, wallet = %user.wallet_address, "user registered");
        Ok(user)
    }

    pub async fn user(&self, user_id: i64) -> Result<User> {
        self.users.find_by_id(user_id).await
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.users.find_by_username(username).await
    }

    pub async fn set_wallet_mode(&self, user_id: i64, mode: WalletMode) -> Result<()> {
        self.users.set_wallet_mode(user_id, mode).await
    }

    pub async fn set_roles(&self, user_id: i64, is_admin: bool, is_creator: bool) -> Result<()> {
        self.users.set_roles(user_id, is_admin, is_creator).await
    }

    /// Load a user and rebuild their signing identity.
    pub async fn signer(&self, user_id: i64) -> Result<(User, PrivateKeySigner)> {
        let user = self.users.find_by_id(user_id).await?;
        let signer = resolve_signer(&user, &self.custody)?;
        Ok((user, signer))
    }
}

/// Rebuild a user's signer from their custody record.
///
/// Fails `CredentialsUnavailable` on any decrypt/parse problem and
/// `AddressMismatch` when the derived address disagrees with the stored
/// wallet address.
pub fn resolve_signer(user: &User, custody: &KeyCustody) -> Result<PrivateKeySigner> {
    let plaintext = custody.decrypt(&user.encrypted_private_key).map_err(|_| {
        warn!(user_id = user.user_id, "failed to decrypt signing key record");
        MarketError::CredentialsUnavailable
    })?;

    let key_str =
        std::str::from_utf8(&plaintext).map_err(|_| MarketError::CredentialsUnavailable)?;

    let signer: PrivateKeySigner = key_str
        .trim()
        .trim_start_matches("0x")
        .parse()
        .map_err(|_| MarketError::CredentialsUnavailable)?;

    let derived = db_address(signer.address());
    if !derived.eq_ignore_ascii_case(&user.wallet_address) {
        return Err(MarketError::AddressMismatch {
            stored: user.wallet_address.clone(),
            derived,
        });
    }

    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn custody() -> KeyCustody {
        KeyCustody::new([3u8; 32])
    }

    fn user_with(custody: &KeyCustody, signer: &PrivateKeySigner) -> User {
        let key_hex = format!("0x{}", hex::encode(signer.to_bytes()));
        User {
            user_id: 1,
            username: "alice".to_string(),
            password_hash: "argon2-hash".to_string(),
            wallet_address: db_address(signer.address()),
            encrypted_private_key: custody.encrypt(key_hex.as_bytes()).unwrap(),
            wallet_mode: "internal".to_string(),
            is_admin: false,
            is_creator: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn resolves_signer_for_valid_record() {
        let custody = custody();
        let signer = PrivateKeySigner::random();
        let user = user_with(&custody, &signer);

        let resolved = resolve_signer(&user, &custody).unwrap();
        assert_eq!(resolved.address(), signer.address());
    }

    #[test]
    fn tampered_record_is_credentials_unavailable() {
        let custody = custody();
        let signer = PrivateKeySigner::random();
        let mut user = user_with(&custody, &signer);
        user.encrypted_private_key = user.encrypted_private_key.replace(':', ":00");

        assert!(matches!(
            resolve_signer(&user, &custody),
            Err(MarketError::CredentialsUnavailable)
        ));
    }

    #[test]
    fn wrong_stored_address_is_a_mismatch() {
        let custody = custody();
        let signer = PrivateKeySigner::random();
        let mut user = user_with(&custody, &signer);
        user.wallet_address = db_address(PrivateKeySigner::random().address());

        assert!(matches!(
            resolve_signer(&user, &custody),
            Err(MarketError::AddressMismatch { .. })
        ));
    }
}
