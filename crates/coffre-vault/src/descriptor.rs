//! The `.secret` descriptor — persisted KDF parameters for stage-2 derivation.
//!
//! This module provides:
//! - [`load_kdf_secret`] — strict loader, fails on anything invalid
//! - [`ensure_secret`] — self-healing loader, recreates on absence/corruption
//! - [`re_key_vault`] — unconditionally replace the descriptor with a fresh one
//!
//! The descriptor is a small plaintext JSON file next to the vault data.
//! Its salt is not secret; what matters is that the file is stable (the
//! legacy vault key is re-derived from it on every unlock) and versioned.
//! A corrupt descriptor is treated as invalid — never as "absent" — and
//! only `ensure_secret` is allowed to recover by recreation: the strict
//! loader exists so that re-keying verification cannot mask a real
//! problem by silently rebuilding the file.

use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use coffre_crypto_core::Argon2idParams;

use crate::error::VaultError;
use crate::util::{ensure_vault_dir, now_iso8601, write_atomic};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Descriptor file name inside the vault directory.
pub const SECRET_FILE: &str = ".secret";

/// Descriptor salt length in bytes.
pub const DESCRIPTOR_SALT_LEN: usize = 16;

/// Default stage-2 time cost applied when a stored field is zero.
pub const DEFAULT_TIME_COST: u32 = 3;

/// Default stage-2 memory cost in KiB (64 MB) applied when a stored field is zero.
pub const DEFAULT_MEMORY_KB: u32 = 65_536;

/// Default stage-2 parallelism applied when a stored field is zero.
pub const DEFAULT_PARALLELISM: u32 = 2;

/// Derived key length recorded in the descriptor.
const KEY_LEN: u32 = 32;

/// KDF identifier recorded in the descriptor.
const KDF_NAME: &str = "argon2id";

/// Current descriptor format version.
const DESCRIPTOR_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// On-disk shape of the `.secret` file.
#[derive(Debug, Serialize, Deserialize)]
struct SecretDescriptor {
    version: u32,
    salt: Vec<u8>,
    time: u32,
    memory_kb: u32,
    threads: u32,
    key_len: u32,
    kdf: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vault_id: Option<String>,
}

/// Validated stage-2 KDF parameters loaded from a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfSecret {
    /// 16-byte Argon2id salt for the stage-2 derivation.
    pub salt: [u8; DESCRIPTOR_SALT_LEN],
    /// Cost parameters, with defaults already applied.
    pub params: Argon2idParams,
    /// Vault fingerprint, if the descriptor carries one.
    pub vault_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate the `.secret` descriptor. Strict: never recreates.
///
/// Zero-valued cost fields are defaulted explicitly so descriptors written
/// by older versions (which omitted them) still work — but never at zero,
/// which would mean running Argon2id at an insecure cost.
///
/// # Errors
///
/// Returns [`VaultError::InvalidDescriptor`] if the file is missing,
/// unparsable, has `version < 1`, or a salt that is not exactly 16 bytes.
pub fn load_kdf_secret(vault_dir: &Path) -> Result<KdfSecret, VaultError> {
    let path = vault_dir.join(SECRET_FILE);
    let bytes = fs::read(&path)
        .map_err(|e| VaultError::InvalidDescriptor(format!("cannot read {SECRET_FILE}: {e}")))?;

    let descriptor: SecretDescriptor = serde_json::from_slice(&bytes)
        .map_err(|e| VaultError::InvalidDescriptor(format!("cannot parse {SECRET_FILE}: {e}")))?;

    if descriptor.version < 1 {
        return Err(VaultError::InvalidDescriptor(format!(
            "invalid version: {}",
            descriptor.version
        )));
    }
    if descriptor.salt.len() != DESCRIPTOR_SALT_LEN {
        return Err(VaultError::InvalidDescriptor(format!(
            "invalid salt length: {} bytes (expected {DESCRIPTOR_SALT_LEN})",
            descriptor.salt.len()
        )));
    }

    let mut salt = [0u8; DESCRIPTOR_SALT_LEN];
    salt.copy_from_slice(&descriptor.salt);

    Ok(KdfSecret {
        salt,
        params: apply_defaults(descriptor.time, descriptor.memory_kb, descriptor.threads),
        vault_id: descriptor.vault_id,
    })
}

/// Load the descriptor, recreating it if absent or corrupt.
///
/// Corruption is self-healing by recreation, never patched in place: a
/// fresh salt and default cost are generated, persisted atomically, and
/// the file is re-loaded through the strict path.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the recreated descriptor cannot be
/// persisted, or [`VaultError::InvalidDescriptor`] if it cannot be read
/// back (which would indicate a failing disk, not a format problem).
pub fn ensure_secret(vault_dir: &Path) -> Result<KdfSecret, VaultError> {
    if let Ok(secret) = load_kdf_secret(vault_dir) {
        return Ok(secret);
    }
    write_fresh_descriptor(vault_dir, None)?;
    load_kdf_secret(vault_dir)
}

/// Unconditionally replace the descriptor with a brand-new one.
///
/// Called during password change: the fresh salt invalidates the old
/// stage-2 derivation path, so the previous vault key can no longer be
/// re-derived from disk state. The vault fingerprint, if present, is
/// carried over — re-keying changes the keys, not the vault's identity.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the new descriptor cannot be persisted.
pub fn re_key_vault(vault_dir: &Path) -> Result<KdfSecret, VaultError> {
    let vault_id = load_kdf_secret(vault_dir)
        .ok()
        .and_then(|secret| secret.vault_id);
    write_fresh_descriptor(vault_dir, vault_id)?;
    load_kdf_secret(vault_dir)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Apply documented defaults to any zero-valued cost field.
fn apply_defaults(time: u32, memory_kb: u32, threads: u32) -> Argon2idParams {
    Argon2idParams {
        m_cost: if memory_kb == 0 {
            DEFAULT_MEMORY_KB
        } else {
            memory_kb
        },
        t_cost: if time == 0 { DEFAULT_TIME_COST } else { time },
        p_cost: if threads == 0 {
            DEFAULT_PARALLELISM
        } else {
            threads
        },
    }
}

/// Generate a fresh descriptor (random salt, default cost) and persist it
/// atomically, creating the vault directory if needed.
fn write_fresh_descriptor(vault_dir: &Path, vault_id: Option<String>) -> Result<(), VaultError> {
    let mut salt = [0u8; DESCRIPTOR_SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let now = now_iso8601();
    let descriptor = SecretDescriptor {
        version: DESCRIPTOR_VERSION,
        salt: salt.to_vec(),
        time: DEFAULT_TIME_COST,
        memory_kb: DEFAULT_MEMORY_KB,
        threads: DEFAULT_PARALLELISM,
        key_len: KEY_LEN,
        kdf: KDF_NAME.to_owned(),
        created_at: Some(now.clone()),
        updated_at: Some(now),
        vault_id: Some(vault_id.unwrap_or_else(|| fingerprint(&salt))),
    };

    let json = serde_json::to_vec_pretty(&descriptor)
        .map_err(|e| VaultError::InvalidDescriptor(format!("cannot serialize descriptor: {e}")))?;

    ensure_vault_dir(vault_dir)?;
    write_atomic(&vault_dir.join(SECRET_FILE), &json)
}

/// Short hex fingerprint of a salt, used as the vault identifier.
fn fingerprint(salt: &[u8]) -> String {
    let hash = blake3::hash(salt);
    let hex = hash.to_hex();
    hex.as_str()[..16].to_owned()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_descriptor_on_first_use() {
        let dir = tempfile::tempdir().expect("tempdir");
        let secret = ensure_secret(dir.path()).expect("ensure should succeed");
        assert_eq!(secret.salt.len(), DESCRIPTOR_SALT_LEN);
        assert_eq!(secret.params.t_cost, DEFAULT_TIME_COST);
        assert_eq!(secret.params.m_cost, DEFAULT_MEMORY_KB);
        assert_eq!(secret.params.p_cost, DEFAULT_PARALLELISM);
        assert!(dir.path().join(SECRET_FILE).exists());
        assert!(secret.vault_id.is_some());
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = ensure_secret(dir.path()).expect("ensure should succeed");
        let second = ensure_secret(dir.path()).expect("ensure should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn strict_loader_fails_on_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_kdf_secret(dir.path());
        assert!(matches!(result, Err(VaultError::InvalidDescriptor(_))));
    }

    #[test]
    fn strict_loader_fails_on_garbage_while_ensure_recovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(SECRET_FILE), b"not json at all").expect("write");

        let strict = load_kdf_secret(dir.path());
        assert!(matches!(strict, Err(VaultError::InvalidDescriptor(_))));

        let healed = ensure_secret(dir.path()).expect("ensure should recover");
        assert_eq!(healed.salt.len(), DESCRIPTOR_SALT_LEN);
        // The healed file now satisfies the strict loader too.
        let reloaded = load_kdf_secret(dir.path()).expect("strict load after healing");
        assert_eq!(healed, reloaded);
    }

    #[test]
    fn strict_loader_rejects_bad_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json = serde_json::json!({
            "version": 0,
            "salt": vec![0u8; DESCRIPTOR_SALT_LEN],
            "time": 3, "memory_kb": 65_536, "threads": 2,
            "key_len": 32, "kdf": "argon2id",
        });
        fs::write(
            dir.path().join(SECRET_FILE),
            serde_json::to_vec(&json).expect("serialize"),
        )
        .expect("write");
        let result = load_kdf_secret(dir.path());
        assert!(matches!(result, Err(VaultError::InvalidDescriptor(_))));
    }

    #[test]
    fn strict_loader_rejects_wrong_salt_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json = serde_json::json!({
            "version": 1,
            "salt": vec![0u8; 15],
            "time": 3, "memory_kb": 65_536, "threads": 2,
            "key_len": 32, "kdf": "argon2id",
        });
        fs::write(
            dir.path().join(SECRET_FILE),
            serde_json::to_vec(&json).expect("serialize"),
        )
        .expect("write");
        let result = load_kdf_secret(dir.path());
        assert!(matches!(result, Err(VaultError::InvalidDescriptor(_))));
    }

    #[test]
    fn zero_cost_fields_are_defaulted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json = serde_json::json!({
            "version": 1,
            "salt": vec![7u8; DESCRIPTOR_SALT_LEN],
            "time": 0, "memory_kb": 0, "threads": 0,
            "key_len": 32, "kdf": "argon2id",
        });
        fs::write(
            dir.path().join(SECRET_FILE),
            serde_json::to_vec(&json).expect("serialize"),
        )
        .expect("write");
        let secret = load_kdf_secret(dir.path()).expect("load should succeed");
        assert_eq!(secret.params.t_cost, DEFAULT_TIME_COST);
        assert_eq!(secret.params.m_cost, DEFAULT_MEMORY_KB);
        assert_eq!(secret.params.p_cost, DEFAULT_PARALLELISM);
        assert_eq!(secret.salt, [7u8; DESCRIPTOR_SALT_LEN]);
    }

    #[test]
    fn re_key_replaces_salt_but_keeps_vault_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let before = ensure_secret(dir.path()).expect("ensure should succeed");
        let after = re_key_vault(dir.path()).expect("re-key should succeed");
        assert_ne!(before.salt, after.salt, "re-key must generate a new salt");
        assert_eq!(before.vault_id, after.vault_id);
    }

    #[test]
    fn re_key_works_without_prior_descriptor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let secret = re_key_vault(dir.path()).expect("re-key should succeed");
        assert_eq!(secret.salt.len(), DESCRIPTOR_SALT_LEN);
        assert!(secret.vault_id.is_some());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        ensure_secret(dir.path()).expect("ensure should succeed");
        let names: Vec<String> = fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SECRET_FILE.to_owned()]);
    }

    #[test]
    fn descriptor_json_field_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        ensure_secret(dir.path()).expect("ensure should succeed");
        let raw = fs::read_to_string(dir.path().join(SECRET_FILE)).expect("read");
        for field in [
            "version", "salt", "time", "memory_kb", "threads", "key_len", "kdf", "created_at",
        ] {
            assert!(raw.contains(field), "descriptor should contain {field}");
        }
        assert!(raw.contains("argon2id"));
    }
}
