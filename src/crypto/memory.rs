//! In-process handling of secret bytes.
//!
//! Everything that holds password or key material ends up in a
//! `SecretBytes` (or a type wrapping one).  The buffer is owned, cannot
//! be cloned implicitly, and is wiped when dropped, so every exit path of
//! the owning scope (`?`, early `return`, unwinding panic) clears it.

use std::fmt;
use std::sync::atomic::{compiler_fence, Ordering};

use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// Patterns written before the final zero pass.
const WIPE_PATTERNS: [u8; 3] = [0xFF, 0xAA, 0x55];

/// Overwrite `buf` in place with several patterns, finishing with zeros.
///
/// The final pass goes through `zeroize`, which the compiler may not
/// elide; the pattern passes are fenced so they are not merged away.
pub fn wipe(buf: &mut [u8]) {
    for pattern in WIPE_PATTERNS {
        buf.fill(pattern);
        compiler_fence(Ordering::SeqCst);
    }
    buf.zeroize();
}

/// Returns `true` if every byte of `buf` is zero.
pub fn is_wiped(buf: &[u8]) -> bool {
    buf.iter().fold(0u8, |acc, b| acc | b) == 0
}

/// Compare two byte strings in constant time.
///
/// Runs over `max(a.len(), b.len())` bytes no matter where the first
/// difference is, and folds the length check in at the end instead of
/// returning early on a length mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut equal = Choice::from(1u8);

    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        equal &= x.ct_eq(&y);
    }

    let same_len = (a.len() as u64).ct_eq(&(b.len() as u64));
    (equal & same_len).into()
}

/// Copy `buf` into a fresh `SecretBytes`.
///
/// The returned buffer is the only copy this function creates.
pub fn secure_copy(buf: &[u8]) -> SecretBytes {
    SecretBytes::new(buf.to_vec())
}

/// An owned, non-`Clone` byte buffer that is wiped on drop.
pub struct SecretBytes {
    bytes: Vec<u8>,
}

impl SecretBytes {
    /// Take ownership of `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A zero-filled buffer of `len` bytes, for use as an output slot.
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Constant-time comparison against another byte string.
    pub fn ct_eq(&self, other: &[u8]) -> bool {
        constant_time_eq(&self.bytes, other)
    }

    /// Wipe the contents now and leave an empty buffer behind.
    pub fn wipe(&mut self) {
        wipe(&mut self.bytes);
        self.bytes.zeroize();
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<String> for SecretBytes {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipe_leaves_all_zeros() {
        let mut buf = *b"correct horse battery staple";
        wipe(&mut buf);
        assert!(is_wiped(&buf));
    }

    #[test]
    fn is_wiped_detects_residue() {
        assert!(is_wiped(&[]));
        assert!(is_wiped(&[0, 0, 0]));
        assert!(!is_wiped(&[0, 1, 0]));
    }

    #[test]
    fn constant_time_eq_matches_byte_equality() {
        assert!(constant_time_eq(b"", b""));
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"xbc", b"abc"));
    }

    #[test]
    fn constant_time_eq_rejects_length_mismatch() {
        assert!(!constant_time_eq(b"", b"a"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        // A zero-padded prefix must not compare equal.
        assert!(!constant_time_eq(b"ab", b"ab\0"));
    }

    #[test]
    fn secure_copy_is_independent() {
        let mut original = b"password".to_vec();
        let copy = secure_copy(&original);
        wipe(&mut original);
        assert_eq!(copy.as_bytes(), b"password");
    }

    #[test]
    fn secret_bytes_wipe_empties_buffer() {
        let mut secret = SecretBytes::from(String::from("hunter2"));
        assert_eq!(secret.len(), 7);
        secret.wipe();
        assert!(secret.is_empty());
    }

    #[test]
    fn secret_bytes_debug_is_redacted() {
        let secret = SecretBytes::new(b"topsecret".to_vec());
        let debug = format!("{secret:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("topsecret"));
    }
}
