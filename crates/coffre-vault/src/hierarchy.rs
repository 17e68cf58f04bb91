//! Key hierarchy manager — scheme selection and vault unlock.
//!
//! This module provides:
//! - [`KeyScheme`] — the two coexisting derivation schemes as a sum type
//! - [`detect_scheme`] — select the scheme once per vault from disk state
//! - [`create_vault`] — initialize a fresh current-scheme vault
//! - [`unlock`] — password → [`VaultSession`] with master + vault keys
//!
//! A vault is "migrated" iff its root salt file exists. The root salt is
//! generated once at vault creation and is stable for the vault's
//! lifetime — a password change re-derives keys from the same salt.
//! Legacy vaults (no root salt) derive the master key from a fixed salt
//! and the vault key from a second Argon2id pass anchored in `.secret`;
//! that path is only reachable while legacy support is enabled.

use std::fs;
use std::path::Path;

use coffre_crypto_core::kdf::{self, ROOT_SALT_LEN};
use coffre_crypto_core::memory::SecretBytes;
use zeroize::Zeroize;

use crate::descriptor::{self, SECRET_FILE};
use crate::error::VaultError;
use crate::session::VaultSession;
use crate::util::{ensure_vault_dir, write_atomic};

/// Root salt file name inside the vault directory (raw 32 bytes).
pub const ROOT_SALT_FILE: &str = ".root_salt";

// ---------------------------------------------------------------------------
// Scheme selection
// ---------------------------------------------------------------------------

/// The derivation scheme a vault uses, selected once per vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyScheme {
    /// Pre-root-salt vaults: fixed-salt master key, stage-2 vault key.
    Legacy,
    /// Root-salt + HKDF purpose separation.
    Current {
        /// The vault's persisted 32-byte root salt.
        root_salt: [u8; ROOT_SALT_LEN],
    },
}

/// Determine which scheme a vault uses from its persisted root salt.
///
/// # Errors
///
/// Returns [`VaultError::InvalidDescriptor`] if a root salt file exists
/// but does not hold exactly 32 bytes.
pub fn detect_scheme(vault_dir: &Path) -> Result<KeyScheme, VaultError> {
    load_root_salt(vault_dir)?.map_or(Ok(KeyScheme::Legacy), |root_salt| {
        Ok(KeyScheme::Current { root_salt })
    })
}

/// Load the persisted root salt, if any. Missing file is `None`, not an
/// error — it simply means the vault is still on the legacy scheme.
///
/// # Errors
///
/// Returns [`VaultError::InvalidDescriptor`] if the file exists but is not
/// exactly 32 bytes, and [`VaultError::Io`] on read failure.
pub fn load_root_salt(vault_dir: &Path) -> Result<Option<[u8; ROOT_SALT_LEN]>, VaultError> {
    let path = vault_dir.join(ROOT_SALT_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VaultError::Io(e)),
    };
    let salt: [u8; ROOT_SALT_LEN] = bytes.as_slice().try_into().map_err(|_| {
        VaultError::InvalidDescriptor(format!(
            "invalid root salt length: {} bytes (expected {ROOT_SALT_LEN})",
            bytes.len()
        ))
    })?;
    Ok(Some(salt))
}

/// Persist the root salt atomically, creating the vault directory if needed.
///
/// # Errors
///
/// Returns [`VaultError::Io`] on any filesystem failure.
pub fn save_root_salt(vault_dir: &Path, salt: &[u8; ROOT_SALT_LEN]) -> Result<(), VaultError> {
    ensure_vault_dir(vault_dir)?;
    write_atomic(&vault_dir.join(ROOT_SALT_FILE), salt)
}

// ---------------------------------------------------------------------------
// Vault creation
// ---------------------------------------------------------------------------

/// Create a fresh current-scheme vault and return it unlocked.
///
/// Generates and persists the root salt, creates the `.secret` descriptor,
/// and derives the session keys from the password.
///
/// # Errors
///
/// - [`VaultError::VaultAlreadyExists`] if a root salt or descriptor is
///   already present
/// - [`VaultError::Crypto`] if key derivation fails
/// - [`VaultError::Io`] if persistence fails
pub fn create_vault(vault_dir: &Path, password: &str) -> Result<VaultSession, VaultError> {
    if vault_dir.join(ROOT_SALT_FILE).exists() || vault_dir.join(SECRET_FILE).exists() {
        return Err(VaultError::VaultAlreadyExists(
            vault_dir.display().to_string(),
        ));
    }

    let root_salt = kdf::generate_root_salt()?;
    save_root_salt(vault_dir, &root_salt)?;
    descriptor::ensure_secret(vault_dir)?;

    let (master_key, vault_key) = kdf::derive_keys(password.as_bytes(), &root_salt)?;
    Ok(VaultSession::new(
        vault_dir.to_path_buf(),
        KeyScheme::Current { root_salt },
        master_key,
        vault_key,
    ))
}

// ---------------------------------------------------------------------------
// Unlock
// ---------------------------------------------------------------------------

/// Derive the working keys for a vault from its password.
///
/// Current scheme: one Argon2id pass over the root salt, two HKDF
/// expansions, then a descriptor consistency check. Legacy scheme: the
/// fixed-salt master derivation followed by the stage-2 Argon2id pass
/// using the master key bytes as password input and the descriptor's own
/// salt and cost.
///
/// Unlock alone does not prove the password: the caller confirms it by
/// decrypting something under the returned keys (the second-factor blob,
/// or the first entry read). Descriptor failures are therefore reported
/// as [`VaultError::InvalidPassword`] without further detail, so the
/// error cannot be used as a password-existence oracle.
///
/// # Errors
///
/// - [`VaultError::LegacyUnsupported`] if the vault is un-migrated and
///   legacy support is disabled
/// - [`VaultError::InvalidPassword`] on descriptor or derivation trouble
pub fn unlock(vault_dir: &Path, password: &str) -> Result<VaultSession, VaultError> {
    match detect_scheme(vault_dir)? {
        KeyScheme::Current { root_salt } => {
            let (master_key, vault_key) = kdf::derive_keys(password.as_bytes(), &root_salt)?;
            // Consistency check only — the vault key comes from HKDF, not
            // from the descriptor. Indistinct error per the module docs.
            descriptor::ensure_secret(vault_dir).map_err(|_| VaultError::InvalidPassword)?;
            Ok(VaultSession::new(
                vault_dir.to_path_buf(),
                KeyScheme::Current { root_salt },
                master_key,
                vault_key,
            ))
        }
        KeyScheme::Legacy => {
            if !kdf::legacy_support_enabled() {
                return Err(VaultError::LegacyUnsupported);
            }
            let master_key = kdf::derive_legacy_master_key(password.as_bytes())?;
            let secret = descriptor::ensure_secret(vault_dir)?;
            let vault_key = stage_two_vault_key(&master_key, &secret)?;
            Ok(VaultSession::new(
                vault_dir.to_path_buf(),
                KeyScheme::Legacy,
                master_key,
                vault_key,
            ))
        }
    }
}

/// Stage-2 derivation: the legacy scheme's substitute for HKDF purpose
/// separation. The master key bytes act as the password input, keyed by
/// the descriptor's own salt and cost.
pub(crate) fn stage_two_vault_key(
    master_key: &SecretBytes<32>,
    secret: &crate::descriptor::KdfSecret,
) -> Result<SecretBytes<32>, VaultError> {
    let buf = kdf::derive(master_key.expose(), &secret.salt, &secret.params)?;
    let mut arr = [0u8; 32];
    arr.copy_from_slice(buf.expose());
    let key = SecretBytes::new(arr);
    arr.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
