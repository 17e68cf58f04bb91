//! Re-keying protocol — password change over an entire vault tree.
//!
//! The protocol is linear with no branching back:
//!
//! 1. Verify the old password by unlocking normally
//! 2. Pre-flight: decrypt every entry and attachment under the old vault
//!    key (memory only, nothing written)
//! 3. Derive the new keys in the vault's scheme family
//! 4. Replace the `.secret` descriptor — the point of no return — and
//!    re-seal the second-factor blob under the new master key
//! 5. Re-encrypt every entry file, then every attachment file, in place
//!
//! The pre-flight pass means a wrong old password or an already-corrupt
//! file aborts before any disk mutation. What remains unguarded is a
//! crash between steps 4 and 5: there is no journal, so an interrupted
//! run leaves a vault whose descriptor answers only to the new key while
//! some files still hold old-key ciphertext. Such files surface as
//! decryption failures afterwards; [`VaultError::PartialReKey`] names the
//! exact file where an aborted pass stopped so an operator can intervene.

use std::fs;
use std::path::{Path, PathBuf};

use coffre_crypto_core::{cipher, kdf, CryptoError};

use crate::descriptor;
use crate::error::VaultError;
use crate::hierarchy::{self, KeyScheme};
use crate::second_factor;
use crate::session::VaultSession;
use crate::store;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Counts from a completed re-encryption pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReKeyReport {
    /// Entry files rewritten.
    pub entries: usize,
    /// Attachment files rewritten.
    pub attachments: usize,
}

// ---------------------------------------------------------------------------
// Password change
// ---------------------------------------------------------------------------

/// Change the vault password, re-encrypting every persisted ciphertext.
///
/// Stays within the vault's current scheme family: a migrated vault keeps
/// its root salt (password change does not alter the vault's identity)
/// and re-derives the key pair from the new password; a legacy vault
/// re-runs the fixed-salt master derivation and is re-anchored to the
/// fresh descriptor via the stage-2 pass.
///
/// Returns the new unlocked session; all old key material is zeroized.
///
/// # Errors
///
/// - [`VaultError::InvalidPassword`] if the old password fails
///   verification or any file fails the pre-flight decryption — in both
///   cases no disk state has changed
/// - [`VaultError::LegacyUnsupported`] for an un-migrated vault with
///   legacy support disabled
/// - [`VaultError::PartialReKey`] if the re-encryption pass aborts after
///   the descriptor swap
pub fn change_password(
    vault_dir: &Path,
    old_password: &str,
    new_password: &str,
) -> Result<VaultSession, VaultError> {
    // Step 1: verify the old password exactly as unlock does.
    let old_session = hierarchy::unlock(vault_dir, old_password)?;

    // Reading the second-factor blob doubles as old-password proof in the
    // current scheme: a wrong master key fails authentication here, before
    // anything is written.
    let second_factor =
        second_factor::read_pin_config(vault_dir, old_session.master_key().expose())?;

    // Step 2: pre-flight — every file must decrypt under the old key.
    verify_all_decryptable(vault_dir, old_session.vault_key().expose())?;

    // Step 3: derive the new keys in the same scheme family.
    let scheme = old_session.scheme().clone();
    let (new_master, new_vault) = match &scheme {
        KeyScheme::Current { root_salt } => {
            let (master, vault) = kdf::derive_keys(new_password.as_bytes(), root_salt)?;
            (master, Some(vault))
        }
        KeyScheme::Legacy => (kdf::derive_legacy_master_key(new_password.as_bytes())?, None),
    };

    // Step 4: replace the descriptor — point of no return. The old
    // stage-2 vault key can no longer be re-derived from disk state.
    let new_secret = descriptor::re_key_vault(vault_dir)?;

    let new_vault = match new_vault {
        Some(vault) => vault,
        None => hierarchy::stage_two_vault_key(&new_master, &new_secret)?,
    };

    // Re-seal the second-factor blob under the new master key so the gate
    // survives the password change.
    if let Some(config) = &second_factor {
        second_factor::write_pin_config(vault_dir, new_master.expose(), config)?;
    }

    // Step 5: rewrite every ciphertext file under the new vault key.
    re_key_entries(
        vault_dir,
        old_session.vault_key().expose(),
        new_vault.expose(),
    )?;

    old_session.lock();
    Ok(VaultSession::new(
        vault_dir.to_path_buf(),
        scheme,
        new_master,
        new_vault,
    ))
}

// ---------------------------------------------------------------------------
// Re-encryption pass
// ---------------------------------------------------------------------------

/// Re-encrypt every entry and attachment file from `old_key` to `new_key`.
///
/// Walks every category subdirectory, then the attachments directory.
/// Missing directories are skipped — a vault without attachments or with
/// unpopulated categories is normal. An empty vault is a successful no-op.
///
/// # Errors
///
/// Returns [`VaultError::PartialReKey`] naming the failed path and the
/// last successfully rewritten one. Files before `last_good` hold new-key
/// ciphertext; the failed file and everything after still hold old-key
/// ciphertext.
pub fn re_key_entries(
    vault_dir: &Path,
    old_key: &[u8],
    new_key: &[u8],
) -> Result<ReKeyReport, VaultError> {
    let mut report = ReKeyReport::default();
    let mut last_good: Option<PathBuf> = None;

    for category in store::category_dirs(vault_dir)? {
        for path in store::entry_files(&category)? {
            re_encrypt_file(&path, old_key, new_key).map_err(|_| VaultError::PartialReKey {
                last_good: last_good.clone(),
                failed: path.clone(),
            })?;
            report.entries = report.entries.saturating_add(1);
            last_good = Some(path);
        }
    }

    for path in store::attachment_files(vault_dir)? {
        re_encrypt_file(&path, old_key, new_key).map_err(|_| VaultError::PartialReKey {
            last_good: last_good.clone(),
            failed: path.clone(),
        })?;
        report.attachments = report.attachments.saturating_add(1);
        last_good = Some(path);
    }

    Ok(report)
}

/// Decrypt one file under `old_key` and overwrite it sealed under `new_key`.
fn re_encrypt_file(path: &Path, old_key: &[u8], new_key: &[u8]) -> Result<(), VaultError> {
    let sealed = fs::read(path)?;
    let plaintext = cipher::decrypt(old_key, &sealed)?;
    let resealed = cipher::encrypt(new_key, plaintext.expose())?;
    fs::write(path, resealed)?;
    Ok(())
}

/// Pre-flight check: every entry and attachment must decrypt under `key`.
///
/// Decrypts to memory only. Failure is reported as the indistinct
/// [`VaultError::InvalidPassword`] — from the caller's side, "the current
/// password does not open this vault" is all there is to know.
fn verify_all_decryptable(vault_dir: &Path, key: &[u8]) -> Result<(), VaultError> {
    let mut check = |path: &Path| -> Result<(), VaultError> {
        let sealed = fs::read(path)?;
        match cipher::decrypt(key, &sealed) {
            Ok(_) => Ok(()),
            Err(CryptoError::Authentication | CryptoError::ShortCiphertext { .. }) => {
                Err(VaultError::InvalidPassword)
            }
            Err(e) => Err(VaultError::Crypto(e)),
        }
    };

    for category in store::category_dirs(vault_dir)? {
        for path in store::entry_files(&category)? {
            check(&path)?;
        }
    }
    for path in store::attachment_files(vault_dir)? {
        check(&path)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
