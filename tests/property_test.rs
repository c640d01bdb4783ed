//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for any valid input.

use proptest::prelude::*;

use ticketchain::crypto::{CustodyError, KeyCustody, NONCE_SIZE, TAG_SIZE};
use ticketchain::domain::{service_fee, total_due, BPS_DENOMINATOR};

fn custody() -> KeyCustody {
    KeyCustody::new([13u8; 32])
}

// ============================================================================
// Key Custody Properties
// ============================================================================

proptest! {
    /// Property: decrypt(encrypt(x)) == x for arbitrary byte strings
    #[test]
    fn custody_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 1..512)) {
        let custody = custody();
        let record = custody.encrypt(&plaintext).unwrap();
        let recovered = custody.decrypt(&record).unwrap();
        prop_assert_eq!(recovered, plaintext);
    }

    /// Property: the record always carries a fresh nonce, so two
    /// encryptions of the same plaintext never collide
    #[test]
    fn custody_records_never_repeat(plaintext in prop::collection::vec(any::<u8>(), 1..128)) {
        let custody = custody();
        let a = custody.encrypt(&plaintext).unwrap();
        let b = custody.encrypt(&plaintext).unwrap();
        prop_assert_ne!(a, b);
    }

    /// Property: flipping any single ciphertext byte makes decrypt fail
    /// with an integrity error, never returning corrupted plaintext
    #[test]
    fn custody_detects_any_tampered_byte(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        position in any::<prop::sample::Index>(),
    ) {
        let custody = custody();
        let record = custody.encrypt(&plaintext).unwrap();

        let parts: Vec<&str> = record.split(':').collect();
        let mut iv = hex::decode(parts[0]).unwrap();
        let mut tag = hex::decode(parts[1]).unwrap();
        let mut ciphertext = hex::decode(parts[2]).unwrap();

        // Flip one byte somewhere in the record body.
        let total = iv.len() + tag.len() + ciphertext.len();
        let idx = position.index(total);
        if idx < NONCE_SIZE {
            iv[idx] ^= 0x01;
        } else if idx < NONCE_SIZE + TAG_SIZE {
            tag[idx - NONCE_SIZE] ^= 0x01;
        } else {
            ciphertext[idx - NONCE_SIZE - TAG_SIZE] ^= 0x01;
        }

        let tampered = format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        );

        prop_assert!(matches!(
            custody.decrypt(&tampered),
            Err(CustodyError::Integrity)
        ));
    }

    /// Property: a record decrypted under a different master key fails
    #[test]
    fn custody_rejects_wrong_key(plaintext in prop::collection::vec(any::<u8>(), 1..128)) {
        let record = custody().encrypt(&plaintext).unwrap();
        let other = KeyCustody::new([14u8; 32]);
        prop_assert!(other.decrypt(&record).is_err());
    }
}

// ============================================================================
// Fee Arithmetic Properties
// ============================================================================

proptest! {
    /// Property: the fee never exceeds the exact rational value (floor)
    #[test]
    fn fee_is_floored(price in 0i64..1_000_000_000_000, bps in 0i64..=BPS_DENOMINATOR) {
        let fee = service_fee(price, bps).unwrap();
        let exact = (price as i128) * (bps as i128);
        prop_assert!((fee as i128) * (BPS_DENOMINATOR as i128) <= exact);
        prop_assert!(((fee as i128) + 1) * (BPS_DENOMINATOR as i128) > exact);
    }

    /// Property: total due is at least the price and at most double it
    #[test]
    fn total_due_bounds(price in 0i64..1_000_000_000_000, bps in 0i64..=BPS_DENOMINATOR) {
        let due = total_due(price, bps).unwrap();
        prop_assert!(due >= price);
        prop_assert!(due <= price.saturating_mul(2));
    }

    /// Property: the fee is monotonic in the price
    #[test]
    fn fee_is_monotonic(price in 0i64..1_000_000_000, bump in 1i64..1_000_000, bps in 0i64..=BPS_DENOMINATOR) {
        let lower = service_fee(price, bps).unwrap();
        let higher = service_fee(price + bump, bps).unwrap();
        prop_assert!(higher >= lower);
    }
}

// ============================================================================
// Pinned vectors
// ============================================================================

#[test]
fn secondary_purchase_fee_vector() {
    // listing price 90, fee 250 bps -> 90 + floor(90 * 250 / 10000) = 92
    assert_eq!(total_due(90, 250).unwrap(), 92);
}
