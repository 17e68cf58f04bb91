//! `coffre-crypto-core` — Pure cryptographic primitives for COFFRE.
//!
//! This crate is the audit target: zero network, zero async, no filesystem
//! access beyond the OS CSPRNG. The vault layer (`coffre-vault`) composes
//! these primitives into the on-disk key hierarchy.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod cipher;
pub mod kdf;

pub mod pin;
pub mod totp;

pub use cipher::{decrypt, encrypt, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{
    derive, derive_keys, derive_legacy_master_key, derive_root_key, derive_subkey,
    generate_root_salt, legacy_support_enabled, set_legacy_support, Argon2idParams, KeyPurpose,
    LEGACY_PARAMS, ROOT_PARAMS, ROOT_SALT_LEN,
};
pub use memory::{LockedRegion, SecretBuffer, SecretBytes};
pub use pin::{compute_pin_tag, generate_pin_key, verify_pin_tag, PIN_KEY_LEN, PIN_TAG_LEN};
pub use totp::{
    decode_secret, generate_hotp, generate_secret, generate_totp, otpauth_url, validate_totp,
    CODE_DIGITS, DEFAULT_PERIOD, UNLOCK_WINDOW,
};
