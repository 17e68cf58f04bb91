//! Entry and attachment files on disk.
//!
//! One file per logical record, sealed under the vault key:
//!
//! ```text
//! <vaultDir>/<category>/<id>.cfr      entry records
//! <vaultDir>/_attachments/<id>        attachment blobs
//! ```
//!
//! A category is any subdirectory whose name does not start with `.` or
//! `_` — dot-prefixed names are vault metadata (`.secret`, `.root_salt`,
//! `.pin`) and `_attachments` holds attachment blobs. The core treats the
//! record contents as opaque; their internal structure belongs to the
//! embedding application.

use std::fs;
use std::path::{Path, PathBuf};

use coffre_crypto_core::cipher;
use coffre_crypto_core::memory::SecretBuffer;

use crate::error::VaultError;
use crate::util::{ensure_vault_dir, restrict_file};

/// Entry file extension.
pub const ENTRY_EXT: &str = "cfr";

/// Attachments directory name inside the vault root.
pub const ATTACHMENTS_DIR: &str = "_attachments";

// ---------------------------------------------------------------------------
// Directory walking
// ---------------------------------------------------------------------------

/// Returns `true` for directory names that hold entries (not metadata).
fn is_category_name(name: &str) -> bool {
    !name.starts_with('.') && !name.starts_with('_')
}

/// List category subdirectories under the vault root.
///
/// A missing vault directory yields an empty list, not an error — a
/// freshly created vault has no categories yet.
///
/// # Errors
///
/// Returns [`VaultError::Io`] on directory read failure other than absence.
pub fn category_dirs(vault_dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
    let entries = match fs::read_dir(vault_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VaultError::Io(e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if is_category_name(&name.to_string_lossy()) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// List entry files (`.cfr`) inside one category directory.
///
/// # Errors
///
/// Returns [`VaultError::Io`] on directory read failure.
pub fn entry_files(category_dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(category_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// List attachment files under `<vaultDir>/_attachments`.
///
/// A missing attachments directory yields an empty list — vaults without
/// attachments never create it.
///
/// # Errors
///
/// Returns [`VaultError::Io`] on directory read failure other than absence.
pub fn attachment_files(vault_dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
    let dir = vault_dir.join(ATTACHMENTS_DIR);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VaultError::Io(e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Returns `true` iff at least one category contains at least one entry
/// file. Never errors: a fresh or missing vault directory is simply empty.
#[must_use]
pub fn vault_has_entries(vault_dir: &Path) -> bool {
    let Ok(dirs) = category_dirs(vault_dir) else {
        return false;
    };
    dirs.iter()
        .any(|dir| entry_files(dir).is_ok_and(|files| !files.is_empty()))
}

// ---------------------------------------------------------------------------
// Record I/O
// ---------------------------------------------------------------------------

/// Path of an entry record.
#[must_use]
pub fn entry_path(vault_dir: &Path, category: &str, id: &str) -> PathBuf {
    vault_dir.join(category).join(format!("{id}.{ENTRY_EXT}"))
}

/// Path of an attachment blob.
#[must_use]
pub fn attachment_path(vault_dir: &Path, id: &str) -> PathBuf {
    vault_dir.join(ATTACHMENTS_DIR).join(id)
}

/// Seal a record under the vault key and write it, creating the category
/// directory on demand.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] on seal failure or [`VaultError::Io`]
/// on write failure.
pub fn write_entry(
    vault_dir: &Path,
    vault_key: &[u8],
    category: &str,
    id: &str,
    plaintext: &[u8],
) -> Result<(), VaultError> {
    let path = entry_path(vault_dir, category, id);
    write_sealed(&path, vault_key, plaintext)
}

/// Read and open an entry record.
///
/// # Errors
///
/// Returns [`VaultError::NotFound`] if the record does not exist,
/// [`VaultError::Crypto`] on authentication failure.
pub fn read_entry(
    vault_dir: &Path,
    vault_key: &[u8],
    category: &str,
    id: &str,
) -> Result<SecretBuffer, VaultError> {
    let path = entry_path(vault_dir, category, id);
    read_sealed(&path, vault_key)
}

/// Seal an attachment blob under the vault key and write it.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] on seal failure or [`VaultError::Io`]
/// on write failure.
pub fn write_attachment(
    vault_dir: &Path,
    vault_key: &[u8],
    id: &str,
    plaintext: &[u8],
) -> Result<(), VaultError> {
    let path = attachment_path(vault_dir, id);
    write_sealed(&path, vault_key, plaintext)
}

/// Read and open an attachment blob.
///
/// # Errors
///
/// Returns [`VaultError::NotFound`] if the blob does not exist,
/// [`VaultError::Crypto`] on authentication failure.
pub fn read_attachment(
    vault_dir: &Path,
    vault_key: &[u8],
    id: &str,
) -> Result<SecretBuffer, VaultError> {
    let path = attachment_path(vault_dir, id);
    read_sealed(&path, vault_key)
}

fn write_sealed(path: &Path, key: &[u8], plaintext: &[u8]) -> Result<(), VaultError> {
    if let Some(parent) = path.parent() {
        ensure_vault_dir(parent)?;
    }
    let sealed = cipher::encrypt(key, plaintext)?;
    fs::write(path, sealed)?;
    restrict_file(path)
}

fn read_sealed(path: &Path, key: &[u8]) -> Result<SecretBuffer, VaultError> {
    let sealed = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VaultError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(VaultError::Io(e)),
    };
    Ok(cipher::decrypt(key, &sealed)?)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x5A; 32];

    #[test]
    fn entry_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entry(dir.path(), &KEY, "logins", "github", b"hunter2").expect("write");
        let plain = read_entry(dir.path(), &KEY, "logins", "github").expect("read");
        assert_eq!(plain.expose(), b"hunter2");
    }

    #[test]
    fn attachment_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_attachment(dir.path(), &KEY, "doc-1", b"pdf bytes").expect("write");
        let plain = read_attachment(dir.path(), &KEY, "doc-1").expect("read");
        assert_eq!(plain.expose(), b"pdf bytes");
    }

    #[test]
    fn missing_entry_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = read_entry(dir.path(), &KEY, "logins", "nope");
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn metadata_dirs_are_not_categories() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("logins")).expect("mkdir");
        fs::create_dir_all(dir.path().join("_attachments")).expect("mkdir");
        fs::create_dir_all(dir.path().join(".config")).expect("mkdir");
        let dirs = category_dirs(dir.path()).expect("list");
        assert_eq!(dirs, vec![dir.path().join("logins")]);
    }

    #[test]
    fn entry_files_ignores_foreign_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cat = dir.path().join("notes");
        fs::create_dir_all(&cat).expect("mkdir");
        fs::write(cat.join("a.cfr"), b"x").expect("write");
        fs::write(cat.join("b.txt"), b"x").expect("write");
        let files = entry_files(&cat).expect("list");
        assert_eq!(files, vec![cat.join("a.cfr")]);
    }

    #[test]
    fn has_entries_on_fresh_and_missing_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!vault_has_entries(dir.path()));
        assert!(!vault_has_entries(&dir.path().join("does-not-exist")));

        // Empty category still counts as "no entries".
        fs::create_dir_all(dir.path().join("logins")).expect("mkdir");
        assert!(!vault_has_entries(dir.path()));

        write_entry(dir.path(), &KEY, "logins", "one", b"data").expect("write");
        assert!(vault_has_entries(dir.path()));
    }

    #[test]
    fn attachments_do_not_count_as_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_attachment(dir.path(), &KEY, "blob", b"data").expect("write");
        assert!(!vault_has_entries(dir.path()));
    }

    #[test]
    fn entry_file_is_nonce_prefixed_ciphertext() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entry(dir.path(), &KEY, "logins", "raw", b"plaintext").expect("write");
        let on_disk = fs::read(entry_path(dir.path(), "logins", "raw")).expect("read");
        assert_eq!(
            on_disk.len(),
            coffre_crypto_core::NONCE_LEN + b"plaintext".len() + coffre_crypto_core::TAG_LEN
        );
        assert!(!on_disk.windows(9).any(|w| w == b"plaintext"));
    }
}
