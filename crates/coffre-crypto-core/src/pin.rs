//! Keyed PIN tags for the second-factor gate.
//!
//! A PIN is too short to be hashed on its own, so it is never stored in
//! any form. Instead a random 256-bit `pin_key` is generated at setup and
//! the vault persists `HMAC-SHA256(pin_key, pin)` alongside it (both
//! sealed under the master key). Verification recomputes the tag from the
//! supplied PIN and compares in constant time.

use ring::hmac;

use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// PIN key length in bytes (256 bits).
pub const PIN_KEY_LEN: usize = 32;

/// Tag length in bytes (HMAC-SHA256 output).
pub const PIN_TAG_LEN: usize = 32;

/// Generate a fresh random PIN key.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
pub fn generate_pin_key() -> Result<SecretBytes<PIN_KEY_LEN>, CryptoError> {
    SecretBytes::random()
}

/// Compute the keyed tag over a PIN: `HMAC-SHA256(pin_key, pin)`.
#[must_use]
pub fn compute_pin_tag(pin_key: &[u8], pin: &str) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, pin_key);
    hmac::sign(&key, pin.as_bytes()).as_ref().to_vec()
}

/// Verify a PIN against a stored tag in constant time.
///
/// Returns `false` for a wrong PIN or a malformed tag — callers report
/// both as a plain "incorrect" without detail.
#[must_use]
pub fn verify_pin_tag(pin_key: &[u8], pin: &str, tag: &[u8]) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, pin_key);
    hmac::verify(&key, pin.as_bytes(), tag).is_ok()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip_verifies() {
        let pin_key = generate_pin_key().expect("key generation should succeed");
        let tag = compute_pin_tag(pin_key.expose(), "123456");
        assert_eq!(tag.len(), PIN_TAG_LEN);
        assert!(verify_pin_tag(pin_key.expose(), "123456", &tag));
    }

    #[test]
    fn wrong_pin_is_rejected() {
        let pin_key = generate_pin_key().expect("key generation should succeed");
        let tag = compute_pin_tag(pin_key.expose(), "123456");
        assert!(!verify_pin_tag(pin_key.expose(), "654321", &tag));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key_a = generate_pin_key().expect("key generation should succeed");
        let key_b = generate_pin_key().expect("key generation should succeed");
        let tag = compute_pin_tag(key_a.expose(), "123456");
        assert!(!verify_pin_tag(key_b.expose(), "123456", &tag));
    }

    #[test]
    fn truncated_tag_is_rejected() {
        let pin_key = generate_pin_key().expect("key generation should succeed");
        let tag = compute_pin_tag(pin_key.expose(), "123456");
        assert!(!verify_pin_tag(pin_key.expose(), "123456", &tag[..16]));
    }

    #[test]
    fn tag_is_deterministic_per_key() {
        let pin_key = generate_pin_key().expect("key generation should succeed");
        let a = compute_pin_tag(pin_key.expose(), "000000");
        let b = compute_pin_tag(pin_key.expose(), "000000");
        assert_eq!(a, b);
    }

    #[test]
    fn pin_keys_are_unique() {
        let a = generate_pin_key().expect("key generation should succeed");
        let b = generate_pin_key().expect("key generation should succeed");
        assert_ne!(a.expose(), b.expose());
    }
}
