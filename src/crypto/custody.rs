//! Key custody: authenticated encryption of signing keys at rest.
//!
//! Cipher records are stored as `iv_hex:tag_hex:ciphertext_hex` with a
//! fresh random nonce per call. Decryption verifies the GCM tag, so a
//! tampered record or a wrong master key fails closed instead of yielding
//! corrupted plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

/// Master key size (32 bytes for AES-256)
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Environment variable holding the 64-hex-char master key.
pub const MASTER_KEY_ENV: &str = "KEY_CUSTODY_MASTER_KEY";

/// Error type for custody operations
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// Master key missing or malformed; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Tag verification failed: tampered record or wrong master key
    #[error("ciphertext integrity check failed")]
    Integrity,

    /// Record is not `iv:tag:ciphertext` hex
    #[error("invalid cipher record format")]
    Format,

    #[error("encryption failed")]
    EncryptionFailed,
}

/// Holds the master key and performs the at-rest transforms.
///
/// Deliberately does not implement `Debug` or `Display`: the master key
/// must never reach a log line.
#[derive(Clone)]
pub struct KeyCustody {
    key: [u8; KEY_SIZE],
}

impl KeyCustody {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Load the master key from the environment.
    ///
    /// A missing or wrong-length key is a hard error: the caller must halt
    /// startup rather than run without working custody.
    pub fn from_env() -> Result<Self, CustodyError> {
        let hex_key = std::env::var(MASTER_KEY_ENV).map_err(|_| {
            CustodyError::Config(format!(
                "{MASTER_KEY_ENV} is not set; generate one with \
                 `openssl rand -hex 32` and export it before starting"
            ))
        })?;

        let bytes = hex::decode(hex_key.trim()).map_err(|_| {
            CustodyError::Config(format!("{MASTER_KEY_ENV} is not valid hex"))
        })?;

        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CustodyError::Config(format!(
                "{MASTER_KEY_ENV} must be exactly {KEY_SIZE} bytes (64 hex characters)"
            ))
        })?;

        Ok(Self::new(key))
    }

    /// Encrypt plaintext into an `iv:tag:ciphertext` hex record.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CustodyError> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CustodyError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext_with_tag = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CustodyError::EncryptionFailed)?;

        let tag_start = ciphertext_with_tag.len() - TAG_SIZE;
        let ciphertext = &ciphertext_with_tag[..tag_start];
        let tag = &ciphertext_with_tag[tag_start..];

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt an `iv:tag:ciphertext` hex record, verifying the tag.
    pub fn decrypt(&self, record: &str) -> Result<Vec<u8>, CustodyError> {
        let mut parts = record.split(':');
        let (iv_hex, tag_hex, ct_hex) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(iv), Some(tag), Some(ct), None) => (iv, tag, ct),
            _ => return Err(CustodyError::Format),
        };

        let iv = hex::decode(iv_hex).map_err(|_| CustodyError::Format)?;
        let tag = hex::decode(tag_hex).map_err(|_| CustodyError::Format)?;
        let ciphertext = hex::decode(ct_hex).map_err(|_| CustodyError::Format)?;

        if iv.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return Err(CustodyError::Format);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CustodyError::Integrity)?;
        let nonce = Nonce::from_slice(&iv);

        let mut ciphertext_with_tag = ciphertext;
        ciphertext_with_tag.extend_from_slice(&tag);

        cipher
            .decrypt(nonce, ciphertext_with_tag.as_slice())
            .map_err(|_| CustodyError::Integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custody() -> KeyCustody {
        KeyCustody::new([7u8; KEY_SIZE])
    }

    #[test]
    fn roundtrip_recovers_plaintext() {
        let custody = custody();
        let record = custody.encrypt(b"0xdeadbeef").unwrap();
        assert_eq!(custody.decrypt(&record).unwrap(), b"0xdeadbeef");
    }

    #[test]
    fn record_has_three_hex_parts() {
        let custody = custody();
        let record = custody.encrypt(b"secret").unwrap();
        let parts: Vec<&str> = record.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), NONCE_SIZE * 2);
        assert_eq!(parts[1].len(), TAG_SIZE * 2);
    }

    #[test]
    fn nonce_is_unique_per_call() {
        let custody = custody();
        let a = custody.encrypt(b"same input").unwrap();
        let b = custody.encrypt(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let custody = custody();
        let record = custody.encrypt(b"secret key material").unwrap();
        let mut parts: Vec<String> = record.split(':').map(String::from).collect();
        let flipped = if parts[2].as_bytes()[0] == b'0' { "1" } else { "0" };
        parts[2].replace_range(0..1, flipped);
        let tampered = parts.join(":");

        assert!(matches!(
            custody.decrypt(&tampered),
            Err(CustodyError::Integrity)
        ));
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let record = custody().encrypt(b"secret").unwrap();
        let other = KeyCustody::new([8u8; KEY_SIZE]);
        assert!(matches!(other.decrypt(&record), Err(CustodyError::Integrity)));
    }

    #[test]
    fn malformed_record_is_a_format_error() {
        let custody = custody();
        assert!(matches!(custody.decrypt("junk"), Err(CustodyError::Format)));
        assert!(matches!(
            custody.decrypt("aa:bb"),
            Err(CustodyError::Format)
        ));
        assert!(matches!(
            custody.decrypt("zz:zz:zz"),
            Err(CustodyError::Format)
        ));
    }
}
