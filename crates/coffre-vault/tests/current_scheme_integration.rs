#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for current-scheme (root-salt + HKDF) vaults.
//!
//! These run the real root-key cost profile (256 MB Argon2id), so each
//! unlock takes a noticeable moment — the suites below keep the number of
//! derivations small.

use coffre_crypto_core::CryptoError;
use coffre_vault::error::VaultError;
use coffre_vault::{
    change_password, create_vault, load_root_salt, store, unlock, KeyScheme,
};

const PASSWORD: &str = "correct horse battery staple";
const NEW_PASSWORD: &str = "completely different secret";

#[test]
fn create_then_unlock_yields_identical_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let created = create_vault(dir.path(), PASSWORD).expect("create should succeed");

    assert!(matches!(created.scheme(), KeyScheme::Current { .. }));
    assert!(dir.path().join(".root_salt").exists());
    assert!(dir.path().join(".secret").exists());
    assert_ne!(
        created.master_key().expose(),
        created.vault_key().expose(),
        "master and vault keys must always differ"
    );

    // A second creation attempt is refused outright.
    assert!(matches!(
        create_vault(dir.path(), PASSWORD),
        Err(VaultError::VaultAlreadyExists(_))
    ));

    let reopened = unlock(dir.path(), PASSWORD).expect("unlock should succeed");
    assert_eq!(created.master_key().expose(), reopened.master_key().expose());
    assert_eq!(created.vault_key().expose(), reopened.vault_key().expose());
}

#[test]
fn change_password_keeps_root_salt_and_reencrypts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let created = create_vault(dir.path(), PASSWORD).expect("create should succeed");
    let old_vault_key = created.vault_key().expose().to_vec();
    let salt_before = load_root_salt(dir.path()).expect("load").expect("salt exists");

    store::write_entry(dir.path(), &old_vault_key, "logins", "site", b"record")
        .expect("write");
    store::write_attachment(dir.path(), &old_vault_key, "file", b"bytes").expect("write");
    created.lock();

    let session =
        change_password(dir.path(), PASSWORD, NEW_PASSWORD).expect("change should succeed");

    // The root salt is the vault's identity — a password change keeps it.
    let salt_after = load_root_salt(dir.path()).expect("load").expect("salt exists");
    assert_eq!(salt_before, salt_after);

    // New keys differ from the old ones and own every file now.
    assert_ne!(
        session.vault_key().expose().as_slice(),
        old_vault_key.as_slice()
    );
    let record = store::read_entry(dir.path(), session.vault_key().expose(), "logins", "site")
        .expect("read under new key");
    assert_eq!(record.expose(), b"record");
    assert!(matches!(
        store::read_entry(dir.path(), &old_vault_key, "logins", "site"),
        Err(VaultError::Crypto(CryptoError::Authentication))
    ));
    let blob = store::read_attachment(dir.path(), session.vault_key().expose(), "file")
        .expect("read under new key");
    assert_eq!(blob.expose(), b"bytes");
}
