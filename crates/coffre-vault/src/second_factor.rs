//! Second-factor gate — PIN or TOTP, consulted after password verification.
//!
//! The configuration is a small tagged record sealed under the master key
//! and stored at `<vaultDir>/.pin`, independent of the `.secret`
//! descriptor. Exactly one mode is active at a time; re-running setup
//! replaces the blob wholesale. A wrong PIN or code is just `false` —
//! the core keeps no attempt counters and imposes no lockout.
//!
//! Setup flow: the embedding application picks a mode, then either
//! [`enroll_pin`] persists immediately, or [`begin_totp_enrollment`] /
//! [`confirm_totp_enrollment`] require one valid code before persisting
//! (proving the authenticator actually holds the secret). On every later
//! unlock, [`read_pin_config`] + [`verify_second_factor`] gate the
//! session.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use coffre_crypto_core::{cipher, pin, totp, CryptoError};

use crate::error::VaultError;
use crate::util::write_atomic;

/// Second-factor config file name inside the vault directory.
pub const PIN_FILE: &str = ".pin";

/// Issuer label used in `otpauth://` provisioning URLs.
const OTP_ISSUER: &str = "COFFRE";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Persisted second-factor configuration (sealed under the master key).
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SecondFactor {
    /// Keyed-tag PIN: the PIN itself is never stored in any form.
    Pin {
        /// Random 256-bit key the tag is computed under.
        pin_key: Vec<u8>,
        /// `HMAC-SHA256(pin_key, pin)`.
        pin_tag: Vec<u8>,
    },
    /// Shared-secret TOTP (SHA-1, 6 digits, 30-second period).
    Totp {
        /// Base32-encoded shared secret.
        totp_secret: String,
    },
}

impl std::fmt::Debug for SecondFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pin { .. } => f.write_str("SecondFactor::Pin(***)"),
            Self::Totp { .. } => f.write_str("SecondFactor::Totp(***)"),
        }
    }
}

/// A TOTP enrollment in progress: the secret to show the user (as text
/// and QR) before it is committed to disk.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TotpEnrollment {
    /// Base32 shared secret for manual entry.
    pub secret: String,
    /// `otpauth://` URL for QR rendering.
    pub url: String,
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Returns `true` if a second-factor config blob exists for this vault.
#[must_use]
pub fn second_factor_configured(vault_dir: &Path) -> bool {
    vault_dir.join(PIN_FILE).exists()
}

/// Seal a config under the master key and persist it atomically,
/// replacing any previous configuration.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] on seal failure or [`VaultError::Io`]
/// on write failure.
pub fn write_pin_config(
    vault_dir: &Path,
    master_key: &[u8],
    config: &SecondFactor,
) -> Result<(), VaultError> {
    let mut plaintext = serde_json::to_vec(config)
        .map_err(|e| VaultError::SecondFactor(format!("cannot serialize config: {e}")))?;
    let sealed = cipher::encrypt(master_key, &plaintext);
    plaintext.zeroize();
    write_atomic(&vault_dir.join(PIN_FILE), &sealed?)
}

/// Load and open the second-factor config, if one exists.
///
/// A missing blob is `None` (setup has not run yet). A blob that fails to
/// open is reported as [`VaultError::InvalidPassword`] — the master key
/// in hand is wrong, and that is all a caller may learn.
///
/// # Errors
///
/// - [`VaultError::InvalidPassword`] if the blob does not authenticate
/// - [`VaultError::SecondFactor`] if the opened blob is unparsable
pub fn read_pin_config(
    vault_dir: &Path,
    master_key: &[u8],
) -> Result<Option<SecondFactor>, VaultError> {
    let path = vault_dir.join(PIN_FILE);
    let sealed = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VaultError::Io(e)),
    };

    let plaintext = match cipher::decrypt(master_key, &sealed) {
        Ok(buffer) => buffer,
        Err(CryptoError::Authentication) => return Err(VaultError::InvalidPassword),
        Err(e) => return Err(VaultError::Crypto(e)),
    };

    let config: SecondFactor = serde_json::from_slice(plaintext.expose())
        .map_err(|e| VaultError::SecondFactor(format!("corrupt config blob: {e}")))?;
    Ok(Some(config))
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// Validate and persist a PIN configuration.
///
/// Generates a fresh `pin_key` and stores only the keyed tag — a prior
/// configuration of either mode is replaced.
///
/// # Errors
///
/// Returns [`VaultError::SecondFactor`] if the PIN is not exactly 6 ASCII
/// digits, otherwise propagates persistence errors.
pub fn enroll_pin(vault_dir: &Path, master_key: &[u8], pin: &str) -> Result<(), VaultError> {
    validate_pin_format(pin)?;
    let pin_key = pin::generate_pin_key()?;
    let config = SecondFactor::Pin {
        pin_tag: pin::compute_pin_tag(pin_key.expose(), pin),
        pin_key: pin_key.expose().to_vec(),
    };
    write_pin_config(vault_dir, master_key, &config)
}

/// Start TOTP enrollment: generate a shared secret for display.
///
/// Nothing touches disk until [`confirm_totp_enrollment`] succeeds.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if secret generation fails.
pub fn begin_totp_enrollment(account: &str) -> Result<TotpEnrollment, VaultError> {
    let secret = totp::generate_secret()?;
    let url = totp::otpauth_url(OTP_ISSUER, account, &secret);
    Ok(TotpEnrollment { secret, url })
}

/// Complete TOTP enrollment: require one valid code, then persist.
///
/// The code check uses the same period and skew tolerance as unlock
/// verification, so an authenticator that passes here will pass later.
///
/// # Errors
///
/// Returns [`VaultError::SecondFactor`] if the confirmation code is
/// invalid; nothing is persisted in that case.
pub fn confirm_totp_enrollment(
    vault_dir: &Path,
    master_key: &[u8],
    enrollment: &TotpEnrollment,
    code: &str,
    now: u64,
) -> Result<(), VaultError> {
    let secret_bytes = totp::decode_secret(&enrollment.secret)?;
    let valid = totp::validate_totp(
        &secret_bytes,
        now,
        code,
        totp::DEFAULT_PERIOD,
        totp::UNLOCK_WINDOW,
    )?;
    if !valid {
        return Err(VaultError::SecondFactor(
            "invalid confirmation code".to_owned(),
        ));
    }

    let config = SecondFactor::Totp {
        totp_secret: enrollment.secret.clone(),
    };
    write_pin_config(vault_dir, master_key, &config)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a PIN or TOTP code against the active configuration.
///
/// Both paths compare in constant time. `now` is the Unix time in
/// seconds, passed in so verification stays deterministic under test.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] only for malformed stored secrets —
/// a merely wrong code is `Ok(false)`.
pub fn verify_second_factor(
    config: &SecondFactor,
    code: &str,
    now: u64,
) -> Result<bool, VaultError> {
    match config {
        SecondFactor::Pin { pin_key, pin_tag } => {
            Ok(pin::verify_pin_tag(pin_key, code, pin_tag))
        }
        SecondFactor::Totp { totp_secret } => {
            let secret_bytes = totp::decode_secret(totp_secret)?;
            Ok(totp::validate_totp(
                &secret_bytes,
                now,
                code,
                totp::DEFAULT_PERIOD,
                totp::UNLOCK_WINDOW,
            )?)
        }
    }
}

/// A PIN is exactly 6 ASCII digits.
fn validate_pin_format(pin: &str) -> Result<(), VaultError> {
    if pin.len() != 6 || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VaultError::SecondFactor(
            "PIN must be exactly 6 digits".to_owned(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
