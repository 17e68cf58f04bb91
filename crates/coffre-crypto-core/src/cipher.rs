//! AES-256-GCM authenticated encryption of opaque byte blobs.
//!
//! This module provides:
//! - [`encrypt`] — seal plaintext with a random nonce, returning raw bytes
//! - [`decrypt`] — authenticate and open sealed bytes, returning [`SecretBuffer`]
//!
//! # Wire Format
//!
//! ```text
//! nonce (12 bytes) || ciphertext (variable) || tag (16 bytes)
//! ```
//!
//! The nonce is freshly generated from the OS CSPRNG on every call and
//! prepended to the output, so a sealed blob is self-contained. Entry
//! files, attachment blobs, and the second-factor config all use this
//! exact format on disk.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt plaintext under a 256-bit key with a random 96-bit nonce.
///
/// Returns `nonce || ciphertext || tag`. Two calls with identical inputs
/// produce different outputs because the nonce is fresh each time — nonce
/// reuse under the same key would void all confidentiality guarantees.
///
/// # Errors
///
/// - [`CryptoError::InvalidKeyLength`] if the key is not exactly 32 bytes
/// - [`CryptoError::Encryption`] if the underlying seal operation fails
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength { actual: key.len() });
    }

    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    let sealing_key = aead::LessSafeKey::new(unbound);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    // Seal in place — the plaintext copy becomes ciphertext + appended tag.
    let mut in_out = plaintext.to_vec();
    if sealing_key
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .is_err()
    {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    }

    let capacity = NONCE_LEN.saturating_add(in_out.len());
    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Decryption
// ---------------------------------------------------------------------------

/// Decrypt `nonce || ciphertext || tag` under a 256-bit key.
///
/// Returns the plaintext as a [`SecretBuffer`] (zeroized on drop). The
/// intermediate buffer is zeroized after copying.
///
/// # Errors
///
/// - [`CryptoError::InvalidKeyLength`] if the key is not exactly 32 bytes
/// - [`CryptoError::ShortCiphertext`] if the input is shorter than the nonce
/// - [`CryptoError::Authentication`] if the tag check fails — wrong key or
///   tampered data, indistinguishable by design
pub fn decrypt(key: &[u8], sealed: &[u8]) -> Result<SecretBuffer, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength { actual: key.len() });
    }
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::ShortCiphertext {
            actual: sealed.len(),
        });
    }

    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    let opening_key = aead::LessSafeKey::new(unbound);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = sealed[NONCE_LEN..].to_vec();
    let plaintext_slice = opening_key
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Authentication)?;

    let result = SecretBuffer::new(plaintext_slice)
        .map_err(|e| CryptoError::SecureMemory(format!("secure buffer allocation failed: {e}")))?;
    in_out.zeroize();
    Ok(result)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed test key — 32 bytes of 0xAA.
    const TEST_KEY: [u8; KEY_LEN] = [0xAA; KEY_LEN];

    /// Different key for wrong-key tests.
    const WRONG_KEY: [u8; KEY_LEN] = [0xBB; KEY_LEN];

    #[test]
    fn encrypt_output_layout() {
        let plaintext = b"hello world";
        let sealed = encrypt(&TEST_KEY, plaintext).expect("encrypt should succeed");
        assert_eq!(sealed.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let plaintext = b"hello world";
        let sealed = encrypt(&TEST_KEY, plaintext).expect("encrypt should succeed");
        let decrypted = decrypt(&TEST_KEY, &sealed).expect("decrypt should succeed");
        assert_eq!(decrypted.expose(), plaintext);
    }

    #[test]
    fn decrypt_fails_on_any_flipped_byte() {
        let sealed = encrypt(&TEST_KEY, b"tamper target").expect("encrypt should succeed");
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0xFF;
            let result = decrypt(&TEST_KEY, &tampered);
            assert!(
                matches!(result, Err(CryptoError::Authentication)),
                "flipping byte {i} should yield CryptoError::Authentication"
            );
        }
    }

    #[test]
    fn decrypt_fails_with_wrong_key() {
        let sealed = encrypt(&TEST_KEY, b"test data").expect("encrypt should succeed");
        let result = decrypt(&WRONG_KEY, &sealed);
        assert!(
            matches!(result, Err(CryptoError::Authentication)),
            "wrong key should yield CryptoError::Authentication"
        );
    }

    #[test]
    fn encrypt_rejects_short_key() {
        let result = encrypt(&[0u8; 31], b"test");
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength { actual: 31 })
        ));
    }

    #[test]
    fn encrypt_rejects_long_key() {
        let result = encrypt(&[0u8; 33], b"test");
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength { actual: 33 })
        ));
    }

    #[test]
    fn decrypt_rejects_wrong_key_length() {
        let sealed = encrypt(&TEST_KEY, b"test").expect("encrypt should succeed");
        let result = decrypt(&[0u8; 16], &sealed);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength { actual: 16 })
        ));
    }

    #[test]
    fn decrypt_rejects_input_shorter_than_nonce() {
        let result = decrypt(&TEST_KEY, &[0u8; NONCE_LEN - 1]);
        assert!(matches!(
            result,
            Err(CryptoError::ShortCiphertext { actual: 11 })
        ));
    }

    #[test]
    fn decrypt_truncated_tag_is_authentication_failure() {
        // Long enough to carry a nonce but missing tag bytes — the cipher
        // rejects it during the open, not during parsing.
        let sealed = encrypt(&TEST_KEY, b"x").expect("encrypt should succeed");
        let truncated = &sealed[..NONCE_LEN + 4];
        let result = decrypt(&TEST_KEY, truncated);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn encrypt_empty_plaintext_roundtrip() {
        let sealed = encrypt(&TEST_KEY, &[]).expect("encrypt empty should succeed");
        assert_eq!(sealed.len(), NONCE_LEN + TAG_LEN);
        let decrypted = decrypt(&TEST_KEY, &sealed).expect("decrypt empty should succeed");
        assert!(decrypted.expose().is_empty());
    }

    #[test]
    fn two_encrypts_of_same_plaintext_differ() {
        let a = encrypt(&TEST_KEY, b"same data").expect("encrypt should succeed");
        let b = encrypt(&TEST_KEY, b"same data").expect("encrypt should succeed");
        assert_ne!(a, b, "fresh nonce per call must make outputs differ");
        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN], "nonces should differ");
    }

    #[test]
    fn decrypt_output_is_secret_buffer() {
        let sealed = encrypt(&TEST_KEY, b"secret").expect("encrypt should succeed");
        let decrypted = decrypt(&TEST_KEY, &sealed).expect("decrypt should succeed");
        assert_eq!(format!("{decrypted:?}"), "SecretBuffer(***)");
    }
}
