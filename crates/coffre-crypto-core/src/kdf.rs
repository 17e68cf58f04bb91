//! Argon2id and HKDF key derivation for the vault key hierarchy.
//!
//! This module provides:
//! - [`derive`] — derive a 256-bit key from a password + salt using Argon2id
//! - [`derive_legacy_master_key`] — frozen fixed-salt derivation for old vaults
//! - [`derive_root_key`] / [`derive_subkey`] / [`derive_keys`] — the current
//!   root-salt + HKDF purpose-separated scheme
//! - [`Argon2idParams`] — serializable parameter set (stored in `.secret`)
//!
//! # Two Coexisting Schemes
//!
//! ```text
//! Legacy:  password ──Argon2id(fixed salt)──► master key
//!          master key ──Argon2id(.secret salt)──► vault key
//!
//! Current: password ──Argon2id(root salt)──► root key
//!          root key ──HKDF "master"──► master key
//!          root key ──HKDF "vault" ──► vault key
//! ```
//!
//! The legacy derivation is preserved byte-for-byte: vaults created before
//! the root-salt scheme encrypted their data under it, and any drift would
//! orphan them. Whether the legacy path may still be used is gated by a
//! process-wide flag ([`set_legacy_support`]).

use crate::error::CryptoError;
use crate::memory::{SecretBuffer, SecretBytes};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::hkdf;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

/// Output length of every derivation in bytes (256 bits).
pub const OUTPUT_LEN: usize = 32;

/// Minimum salt length in bytes. We enforce 16 (stricter than argon2's 8).
const MIN_SALT_LEN: usize = 16;

/// Root salt length in bytes — one per vault, generated at creation.
pub const ROOT_SALT_LEN: usize = 32;

/// Fixed salt for the legacy master-key derivation. Frozen: changing this
/// orphans every vault created before the root-salt scheme.
const LEGACY_SALT: &[u8; 16] = b"coffre.master.v1";

/// Legacy master-key cost — intentionally lower than the current profile,
/// kept only for compatibility with existing vaults.
pub const LEGACY_PARAMS: Argon2idParams = Argon2idParams {
    m_cost: 65_536, // 64 MB
    t_cost: 1,
    p_cost: 4,
};

/// Current-scheme root-key cost — fixed, strictly heavier than legacy.
pub const ROOT_PARAMS: Argon2idParams = Argon2idParams {
    m_cost: 262_144, // 256 MB
    t_cost: 6,
    p_cost: 4,
};

/// Process-wide gate for the legacy derivation path. Enabled by default so
/// existing vaults keep opening; hosts that have migrated every vault can
/// turn it off to refuse the weaker scheme outright.
static LEGACY_SUPPORT: AtomicBool = AtomicBool::new(true);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Argon2id parameter set — persisted in the `.secret` descriptor.
///
/// Fields use the `argon2` crate convention:
/// - `m_cost`: memory in KiB (NOT bytes, NOT MB)
/// - `t_cost`: number of iterations
/// - `p_cost`: degree of parallelism
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2idParams {
    /// Memory cost in kibibytes (1 KiB = 1024 bytes).
    pub m_cost: u32,
    /// Number of iterations (time cost).
    pub t_cost: u32,
    /// Degree of parallelism (number of lanes).
    pub p_cost: u32,
}

/// HKDF purpose label — keeps the master and vault keys collision-free
/// even though both expand from the same root key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPurpose {
    /// Gates unlock and encrypts small metadata blobs (second-factor config).
    Master,
    /// Encrypts entry and attachment file contents.
    Vault,
}

impl KeyPurpose {
    /// HKDF info label for this purpose.
    #[must_use]
    pub const fn info(self) -> &'static [u8] {
        match self {
            Self::Master => b"master",
            Self::Vault => b"vault",
        }
    }
}

// ---------------------------------------------------------------------------
// Legacy support gate
// ---------------------------------------------------------------------------

/// Enable or disable the legacy fixed-salt derivation path process-wide.
pub fn set_legacy_support(enabled: bool) {
    LEGACY_SUPPORT.store(enabled, Ordering::SeqCst);
}

/// Returns `true` if the legacy derivation path may still be used.
#[must_use]
pub fn legacy_support_enabled() -> bool {
    LEGACY_SUPPORT.load(Ordering::SeqCst)
}

// ---------------------------------------------------------------------------
// Core Argon2id
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from a password and salt using Argon2id.
///
/// Deterministic: identical inputs always yield identical output — login
/// works without storing a verifier. The intermediate buffer is zeroized
/// after copying into the returned [`SecretBuffer`].
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if:
/// - The salt is shorter than 16 bytes
/// - The argon2 parameters are invalid
/// - The derivation itself fails (e.g., memory allocation)
pub fn derive(
    password: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<SecretBuffer, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }

    let argon2_params = argon2::Params::new(
        params.m_cost,
        params.t_cost,
        params.p_cost,
        Some(OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 params: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut output = [0u8; OUTPUT_LEN];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2id derivation failed: {e}")))?;

    let result = SecretBuffer::new(&output)
        .map_err(|e| CryptoError::KeyDerivation(format!("secure buffer allocation failed: {e}")))?;
    output.zeroize();
    Ok(result)
}

/// Derive a 256-bit key into a fixed [`SecretBytes<32>`].
fn derive_fixed(
    password: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<SecretBytes<32>, CryptoError> {
    let buf = derive(password, salt, params)?;
    let mut arr = [0u8; OUTPUT_LEN];
    arr.copy_from_slice(buf.expose());
    let key = SecretBytes::new(arr);
    arr.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Legacy scheme
// ---------------------------------------------------------------------------

/// Derive the legacy master key: Argon2id over the password with the fixed
/// salt and legacy cost profile.
///
/// Must remain byte-identical to the pre-root-salt derivation — existing
/// vaults' metadata is encrypted under its output.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the derivation fails.
pub fn derive_legacy_master_key(password: &[u8]) -> Result<SecretBytes<32>, CryptoError> {
    derive_fixed(password, LEGACY_SALT, &LEGACY_PARAMS)
}

// ---------------------------------------------------------------------------
// Current scheme
// ---------------------------------------------------------------------------

/// Generate a fresh 32-byte root salt from the OS CSPRNG.
///
/// One per vault, created once and stable for the vault's lifetime. Not
/// secret — its role is to make key derivation vault-specific.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
pub fn generate_root_salt() -> Result<[u8; ROOT_SALT_LEN], CryptoError> {
    let mut salt = [0u8; ROOT_SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    Ok(salt)
}

/// Derive the transient root key: Argon2id over the password with the
/// vault's root salt and the fixed current-scheme cost profile.
///
/// The root key is never persisted — it exists only long enough to expand
/// into the master and vault keys via [`derive_subkey`].
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the derivation fails.
pub fn derive_root_key(
    password: &[u8],
    root_salt: &[u8; ROOT_SALT_LEN],
) -> Result<SecretBuffer, CryptoError> {
    derive(password, root_salt, &ROOT_PARAMS)
}

/// Marker type for `ring::hkdf::Prk::expand` — requests 32-byte output.
struct SubkeyLen;

impl hkdf::KeyType for SubkeyLen {
    fn len(&self) -> usize {
        OUTPUT_LEN
    }
}

/// Expand a root key into a purpose-separated 256-bit subkey via
/// HKDF-SHA256.
///
/// The extract step uses an empty salt (RFC 5869 zero-fill); separation
/// comes from the purpose info label, so `Master` and `Vault` subkeys of
/// the same root key never collide.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the HKDF expand fails.
pub fn derive_subkey(
    root_key: &[u8],
    purpose: KeyPurpose,
) -> Result<SecretBytes<32>, CryptoError> {
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
    let prk = salt.extract(root_key);
    let info = [purpose.info()];
    let okm = prk
        .expand(&info, SubkeyLen)
        .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed".into()))?;

    let mut key_bytes = [0u8; OUTPUT_LEN];
    okm.fill(&mut key_bytes)
        .map_err(|_| CryptoError::KeyDerivation("HKDF fill failed".into()))?;

    let key = SecretBytes::new(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Derive the (master, vault) key pair for the current scheme.
///
/// Composes [`derive_root_key`] with two [`derive_subkey`] expansions.
/// Deterministic; a different password or root salt yields a different
/// pair, and the two halves always differ from each other.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if any derivation step fails.
pub fn derive_keys(
    password: &[u8],
    root_salt: &[u8; ROOT_SALT_LEN],
) -> Result<(SecretBytes<32>, SecretBytes<32>), CryptoError> {
    let root_key = derive_root_key(password, root_salt)?;
    let master = derive_subkey(root_key.expose(), KeyPurpose::Master)?;
    let vault = derive_subkey(root_key.expose(), KeyPurpose::Vault)?;
    Ok((master, vault))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
