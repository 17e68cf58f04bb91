//! Secure memory types for key material.
//!
//! This module provides:
//! - [`SecretBuffer`] — variable-length buffer, zeroized on drop
//! - [`SecretBytes`] — fixed-length buffer for keys and salts
//!
//! Both wrappers `mlock` their backing memory on Unix (best-effort, so
//! key material is not swapped to disk) and mask their `Debug`/`Display`
//! output so secrets never end up in logs or panic messages.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Memory locking
// ---------------------------------------------------------------------------

/// RAII guard that `munlock`s a memory region on drop.
///
/// Locking is soft: if `mlock` fails (quota, privileges) the region simply
/// stays unlocked and a one-time warning is printed. Zeroization on drop is
/// independent of lock status.
pub struct LockedRegion {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: The pointer is only passed to mlock/munlock, which are thread-safe.
// The pointed-to data is owned by SecretBuffer/SecretBytes and never read
// through LockedRegion.
unsafe impl Send for LockedRegion {}
unsafe impl Sync for LockedRegion {}

impl LockedRegion {
    /// Attempt to lock a memory region, returning a guard that unlocks on drop.
    #[must_use]
    pub(crate) fn try_lock(ptr: *const u8, len: usize) -> Self {
        let locked = platform::try_mlock(ptr, len);
        if !locked && len > 0 {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| {
                eprintln!(
                    "[coffre-crypto-core] WARNING: mlock failed — \
                     secret data may be swapped to disk. \
                     Consider increasing RLIMIT_MEMLOCK."
                );
            });
        }
        Self { ptr, len, locked }
    }

    /// Returns `true` if the memory region is currently locked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for LockedRegion {
    fn drop(&mut self) {
        if self.locked {
            platform::try_munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer — variable-length
// ---------------------------------------------------------------------------

/// Variable-length buffer for sensitive data (derived keys, decrypted
/// plaintext).
///
/// Wraps [`SecretSlice<u8>`] from the `secrecy` crate, which zeroizes on
/// drop, and adds best-effort `mlock` plus masked `Debug` output.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    lock: LockedRegion,
}

impl SecretBuffer {
    /// Copy `data` into a new `SecretBuffer`.
    ///
    /// The caller should zeroize the source after calling this.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if allocation fails.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let lock = LockedRegion::try_lock(exposed.as_ptr(), exposed.len());
        Ok(Self { inner, lock })
    }

    /// Expose the underlying bytes for a cryptographic operation.
    ///
    /// Keep exposure minimal — prefer using the slice within a single
    /// expression rather than binding it to a long-lived variable.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Returns the number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the underlying memory is `mlock`'d.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

impl fmt::Display for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N> — fixed-size
// ---------------------------------------------------------------------------

/// Fixed-size buffer for keys, salts, and other fixed-length secrets.
///
/// Derives `Zeroize` + `ZeroizeOnDrop` so the bytes are erased when the
/// value goes out of scope.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    // LockedRegion handles its own Drop; it holds no secret bytes.
    #[zeroize(skip)]
    lock: LockedRegion,
}

impl<const N: usize> SecretBytes<N> {
    /// Create a new `SecretBytes` from a fixed-size array.
    ///
    /// The array is moved into the struct (no copy remains with the caller).
    ///
    /// **Note on `mlock`:** the region is locked at the current address; if
    /// the value is later moved, the guard still references the original
    /// address. `munlock` on a stale address is a safe no-op, and the
    /// zeroize-on-drop guarantee does not depend on lock status.
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        // Two-phase init: dummy lock first so `bytes` has a stable address
        // before the real lock is taken. The dummy is safe to drop
        // (locked=false → no munlock call).
        let mut s = Self {
            bytes: data,
            lock: LockedRegion {
                ptr: std::ptr::null(),
                len: 0,
                locked: false,
            },
        };
        s.lock = LockedRegion::try_lock(s.bytes.as_ptr(), N);
        s
    }

    /// Create `SecretBytes` filled with cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; N];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self::new(bytes))
    }

    /// Expose the underlying bytes for cryptographic operations.
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> fmt::Display for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Platform-specific implementations
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock accepts any valid pointer/length pair; on an
        // invalid region the kernel returns ENOMEM, which we treat as
        // "not locked".
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock is safe to call; failure is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
