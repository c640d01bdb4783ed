//! Cryptographic utilities.
//!
//! Key custody: AES-256-GCM encryption of per-user signing keys at rest.

mod custody;

pub use custody::{CustodyError, KeyCustody, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
