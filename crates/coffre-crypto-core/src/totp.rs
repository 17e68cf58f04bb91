//! RFC 6238 TOTP / RFC 4226 HOTP for the second-factor gate.
//!
//! Codes are HMAC-SHA1, 6 digits, 30-second period — the profile every
//! mainstream authenticator app ships with. Shared secrets travel as
//! base32 text (unpadded, RFC 4648) so they can be typed or rendered as
//! an `otpauth://` QR code.

use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::hmac;

use crate::error::CryptoError;

/// TOTP period in seconds (RFC 6238 §4).
pub const DEFAULT_PERIOD: u32 = 30;

/// Time-step skew tolerance applied when validating an unlock code:
/// codes from T-2 through T+2 are accepted.
pub const UNLOCK_WINDOW: u32 = 2;

/// Number of digits in a generated code.
pub const CODE_DIGITS: usize = 6;

/// Shared secret length in bytes (160 bits, RFC 4226 §4 recommendation).
const SECRET_LEN: usize = 20;

/// Truncation modulus for 6-digit codes.
const CODE_MODULUS: u32 = 1_000_000;

/// Constant-time byte comparison for OTP codes.
///
/// Returns `true` iff both slices have equal length and identical contents.
/// Uses bitwise OR accumulation to avoid short-circuit timing leaks. The
/// early return on length mismatch is fine: the digit count is public.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ---------------------------------------------------------------------------
// Secret handling
// ---------------------------------------------------------------------------

/// Generate a fresh 160-bit shared secret, base32-encoded for display.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
pub fn generate_secret() -> Result<String, CryptoError> {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    Ok(BASE32_NOPAD.encode(&bytes))
}

/// Decode a base32 shared secret as entered by the user.
///
/// Whitespace is stripped and lowercase letters accepted, since
/// authenticator apps display secrets in spaced groups.
///
/// # Errors
///
/// Returns `CryptoError::Otp` if the input is empty or not valid base32.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, CryptoError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return Err(CryptoError::Otp("secret must not be empty".to_owned()));
    }
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| CryptoError::Otp(format!("invalid base32 secret: {e}")))
}

/// Build an `otpauth://` provisioning URL for QR rendering.
///
/// The caller is responsible for percent-encoding exotic issuer or account
/// names; vault labels are plain ASCII in practice.
#[must_use]
pub fn otpauth_url(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={CODE_DIGITS}&period={DEFAULT_PERIOD}"
    )
}

// ---------------------------------------------------------------------------
// HOTP (RFC 4226)
// ---------------------------------------------------------------------------

/// Generate a 6-digit HOTP code per RFC 4226 (HMAC-SHA1).
///
/// # Errors
///
/// Returns `CryptoError::Otp` if the secret is empty.
#[must_use = "OTP code should be used or stored"]
pub fn generate_hotp(secret: &[u8], counter: u64) -> Result<String, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::Otp("secret must not be empty".to_owned()));
    }

    // HMAC(K, C) where C is the counter as 8-byte big-endian (RFC 4226 §5.2).
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
    let tag = hmac::sign(&key, &counter.to_be_bytes());
    let mac = tag.as_ref();

    // Dynamic truncation (RFC 4226 §5.3): offset = low 4 bits of last byte,
    // then 31 bits starting there.
    let offset = usize::from(mac[mac.len().wrapping_sub(1)] & 0x0F);
    let binary_code = u32::from_be_bytes([
        mac[offset] & 0x7F,
        mac[offset.wrapping_add(1)],
        mac[offset.wrapping_add(2)],
        mac[offset.wrapping_add(3)],
    ]);

    // CODE_MODULUS is a non-zero constant.
    #[allow(clippy::arithmetic_side_effects)]
    let code = binary_code % CODE_MODULUS;
    let width = CODE_DIGITS;
    Ok(format!("{code:0>width$}"))
}

// ---------------------------------------------------------------------------
// TOTP (RFC 6238)
// ---------------------------------------------------------------------------

/// Generate a 6-digit TOTP code for the given Unix time.
///
/// # Errors
///
/// Returns `CryptoError::Otp` if `period` is 0 or the secret is empty.
#[must_use = "OTP code should be used or stored"]
pub fn generate_totp(secret: &[u8], time: u64, period: u32) -> Result<String, CryptoError> {
    if period == 0 {
        return Err(CryptoError::Otp("period must be > 0".to_owned()));
    }

    // T = floor(time / period) per RFC 6238 §4; period validated non-zero.
    let period_u64 = u64::from(period);
    #[allow(clippy::arithmetic_side_effects)]
    let time_step = time / period_u64;
    generate_hotp(secret, time_step)
}

/// Validate a TOTP code within ±`window` time steps.
///
/// Every candidate step in the window is checked with constant-time
/// comparison; all of them are evaluated even after a match so the timing
/// does not reveal which step matched.
///
/// # Errors
///
/// Returns `CryptoError::Otp` if `period` is 0 or the secret is empty.
#[must_use = "validation result should be checked"]
pub fn validate_totp(
    secret: &[u8],
    time: u64,
    code: &str,
    period: u32,
    window: u32,
) -> Result<bool, CryptoError> {
    if period == 0 {
        return Err(CryptoError::Otp("period must be > 0".to_owned()));
    }

    let period_u64 = u64::from(period);
    #[allow(clippy::arithmetic_side_effects)]
    let time_step = time / period_u64;

    // Saturating bounds: at time_step=0 the window starts at 0, it does not
    // wrap to u64::MAX.
    let start = time_step.saturating_sub(u64::from(window));
    let end = time_step.saturating_add(u64::from(window));

    let mut valid = false;
    let mut step = start;
    loop {
        let expected = generate_hotp(secret, step)?;
        if constant_time_eq(expected.as_bytes(), code.as_bytes()) {
            valid = true;
        }
        if step == end {
            break;
        }
        step = step.wrapping_add(1);
    }

    Ok(valid)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
