//! In-memory unlocked session — the single owner of live key material.
//!
//! The original design kept the working keys in package-level globals;
//! here they live in one explicit [`VaultSession`] that the embedding
//! application owns for the duration of an unlocked session and drops on
//! logout. Both keys are [`SecretBytes`] and are zeroized on drop, so
//! locking the vault is simply letting the session go out of scope (or
//! calling [`VaultSession::lock`] to make the intent explicit).

use std::fmt;
use std::path::{Path, PathBuf};

use coffre_crypto_core::memory::{SecretBuffer, SecretBytes};
use coffre_crypto_core::{cipher, CryptoError};

use crate::hierarchy::KeyScheme;

/// An unlocked vault: directory, scheme, and the two working keys.
///
/// Only one copy of the key material should exist per process. The
/// session is deliberately not `Clone`.
pub struct VaultSession {
    vault_dir: PathBuf,
    scheme: KeyScheme,
    master_key: SecretBytes<32>,
    vault_key: SecretBytes<32>,
}

impl VaultSession {
    /// Assemble a session from freshly derived keys.
    #[must_use]
    pub(crate) fn new(
        vault_dir: PathBuf,
        scheme: KeyScheme,
        master_key: SecretBytes<32>,
        vault_key: SecretBytes<32>,
    ) -> Self {
        Self {
            vault_dir,
            scheme,
            master_key,
            vault_key,
        }
    }

    /// The vault root directory this session operates on.
    #[must_use]
    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    /// The derivation scheme this vault uses.
    #[must_use]
    pub const fn scheme(&self) -> &KeyScheme {
        &self.scheme
    }

    /// The master key — gates unlock and seals small metadata blobs.
    #[must_use]
    pub const fn master_key(&self) -> &SecretBytes<32> {
        &self.master_key
    }

    /// The vault key — seals entry and attachment contents.
    #[must_use]
    pub const fn vault_key(&self) -> &SecretBytes<32> {
        &self.vault_key
    }

    /// Seal an opaque blob under the vault key.
    ///
    /// # Errors
    ///
    /// Propagates [`CryptoError`] from the cipher.
    pub fn encrypt_blob(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher::encrypt(self.vault_key.expose(), plaintext)
    }

    /// Open an opaque blob sealed under the vault key.
    ///
    /// # Errors
    ///
    /// Propagates [`CryptoError`] from the cipher — notably
    /// [`CryptoError::Authentication`] for wrong-key or tampered data.
    pub fn decrypt_blob(&self, sealed: &[u8]) -> Result<SecretBuffer, CryptoError> {
        cipher::decrypt(self.vault_key.expose(), sealed)
    }

    /// Lock the vault: consume the session, zeroizing both keys.
    pub fn lock(self) {
        drop(self);
    }
}

impl fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSession")
            .field("vault_dir", &self.vault_dir)
            .field("keys", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> VaultSession {
        VaultSession::new(
            PathBuf::from("/tmp/vault"),
            KeyScheme::Legacy,
            SecretBytes::new([0x11; 32]),
            SecretBytes::new([0x22; 32]),
        )
    }

    #[test]
    fn blob_roundtrip_under_vault_key() {
        let session = test_session();
        let sealed = session.encrypt_blob(b"hello world").expect("encrypt");
        let opened = session.decrypt_blob(&sealed).expect("decrypt");
        assert_eq!(opened.expose(), b"hello world");
    }

    #[test]
    fn blob_sealed_under_different_session_fails() {
        let session = test_session();
        let other = VaultSession::new(
            PathBuf::from("/tmp/vault"),
            KeyScheme::Legacy,
            SecretBytes::new([0x11; 32]),
            SecretBytes::new([0x33; 32]),
        );
        let sealed = session.encrypt_blob(b"hello").expect("encrypt");
        let result = other.decrypt_blob(&sealed);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn debug_output_is_masked() {
        let session = test_session();
        let debug = format!("{session:?}");
        assert!(debug.contains("***"));
        assert!(!debug.contains("11"));
        assert!(!debug.contains("22"));
    }
}
