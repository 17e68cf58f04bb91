//! Vault error types for `coffre-vault`.

use std::path::PathBuf;
use thiserror::Error;

use coffre_crypto_core::CryptoError;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Wrong password, or vault state that is indistinguishable from one.
    /// Deliberately not split further — distinguishing "no such descriptor"
    /// from "wrong password" would leak which is the case.
    #[error("wrong password or vault error")]
    InvalidPassword,

    /// Corrupt or unreadable `.secret` descriptor. Only surfaced by the
    /// strict loader; `ensure_secret` self-heals by recreation instead.
    #[error("invalid secret descriptor: {0}")]
    InvalidDescriptor(String),

    /// The vault still uses the legacy fixed-salt scheme but legacy
    /// support has been disabled process-wide.
    #[error("vault uses the legacy key scheme but legacy support is disabled")]
    LegacyUnsupported,

    /// A vault already exists at the target path.
    #[error("vault already exists: {0}")]
    VaultAlreadyExists(String),

    /// Vault directory, entry, or attachment not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Second-factor setup or verification error (malformed PIN, bad
    /// enrollment code, corrupt config blob).
    #[error("second factor error: {0}")]
    SecondFactor(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A re-encryption pass aborted partway. Names the last file that was
    /// successfully rewritten and the one that failed, for manual
    /// recovery — there is no automated rollback.
    #[error("re-keying aborted at {failed:?} (last successfully re-encrypted: {last_good:?})")]
    PartialReKey {
        /// Last file rewritten under the new key, if any.
        last_good: Option<PathBuf>,
        /// The file whose decrypt/encrypt/write failed.
        failed: PathBuf,
    },
}
