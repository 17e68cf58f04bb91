//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key is not exactly 32 bytes. Never silently truncated or padded.
    #[error("invalid key length: {actual} bytes (expected 32)")]
    InvalidKeyLength {
        /// The length that was supplied.
        actual: usize,
    },

    /// Ciphertext shorter than the prepended nonce — cannot even be parsed.
    #[error("ciphertext too short: {actual} bytes (minimum 12)")]
    ShortCiphertext {
        /// The length that was supplied.
        actual: usize,
    },

    /// Authentication tag verification failed — ciphertext tampered or wrong key.
    /// Deliberately carries no detail: callers only learn "cannot decrypt".
    #[error("decryption failed: authentication tag mismatch")]
    Authentication,

    /// Symmetric encryption failure (AES-256-GCM setup or seal).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Key derivation failed (Argon2id parameter validation, memory
    /// allocation, HKDF expand).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// TOTP/HOTP generation or validation error.
    #[error("OTP error: {0}")]
    Otp(String),

    /// Secure memory allocation failure (mlock, CSPRNG).
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
