//! `coffre-vault` — Vault key management and re-encryption for COFFRE.
//!
//! Composes the primitives from `coffre-crypto-core` into the on-disk
//! vault: the `.secret` descriptor, the two-scheme key hierarchy, the
//! unlocked session object, entry/attachment storage, the password-change
//! (re-keying) protocol, and the PIN/TOTP second-factor gate.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;

pub mod descriptor;
pub mod hierarchy;
pub mod session;

pub mod store;

pub mod rekey;

pub mod second_factor;

mod util;

pub use descriptor::{
    ensure_secret, load_kdf_secret, re_key_vault, KdfSecret, DEFAULT_MEMORY_KB,
    DEFAULT_PARALLELISM, DEFAULT_TIME_COST, DESCRIPTOR_SALT_LEN, SECRET_FILE,
};
pub use error::VaultError;
pub use hierarchy::{
    create_vault, detect_scheme, load_root_salt, save_root_salt, unlock, KeyScheme,
    ROOT_SALT_FILE,
};
pub use rekey::{change_password, re_key_entries, ReKeyReport};
pub use second_factor::{
    begin_totp_enrollment, confirm_totp_enrollment, enroll_pin, read_pin_config,
    second_factor_configured, verify_second_factor, write_pin_config, SecondFactor,
    TotpEnrollment, PIN_FILE,
};
pub use session::VaultSession;
pub use store::{
    attachment_files, category_dirs, entry_files, read_attachment, read_entry,
    vault_has_entries, write_attachment, write_entry, ATTACHMENTS_DIR, ENTRY_EXT,
};
