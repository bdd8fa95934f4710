//! Purpose-tagged key material.
//!
//! A password and a salt yield two independent keys, one for the cipher
//! and one for the MAC.  The purpose is part of the PBKDF2 salt, so the
//! two keys are unrelated even though they come from the same inputs.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::memory::constant_time_eq;

/// Length of derived keys (256 bits).
pub const KEY_LEN: usize = 32;

/// What a derived key is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// AES-256-GCM key.
    Encryption,
    /// HMAC-SHA256 key for envelope tags.
    Authentication,
}

impl KeyPurpose {
    /// ASCII tag appended to the salt before derivation.
    pub fn tag(self) -> &'static [u8] {
        match self {
            KeyPurpose::Encryption => b"encryption",
            KeyPurpose::Authentication => b"authentication",
        }
    }
}

/// A 32-byte key that remembers its purpose and zeroes itself on drop.
///
/// Deliberately not `Clone`: there is exactly one owner of each key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
    #[zeroize(skip)]
    purpose: KeyPurpose,
}

impl DerivedKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN], purpose: KeyPurpose) -> Self {
        Self { bytes, purpose }
    }

    /// Build from a slice (must be exactly 32 bytes).
    pub fn from_slice(slice: &[u8], purpose: KeyPurpose) -> Option<Self> {
        if slice.len() != KEY_LEN {
            return None;
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(slice);
        let key = Self::new(bytes, purpose);
        bytes.zeroize();
        Some(key)
    }

    /// Access the raw key bytes (e.g. to key a cipher or MAC).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.purpose == other.purpose && constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for DerivedKey {}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("purpose", &self.purpose)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
