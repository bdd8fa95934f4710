//! Cryptographic primitives for GhostVault.
//!
//! This module provides:
//! - Secret buffers, wiping and constant-time comparison (`memory`)
//! - PBKDF2-HMAC-SHA256 key derivation with purpose separation (`kdf`, `keys`)
//! - AES-256-GCM + HMAC-SHA256 envelopes (`encryption`, `envelope`)
//! - The session-scoped `AuthenticatedCipher` (`cipher`)

pub mod cipher;
pub mod encryption;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod memory;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, KeyDerivation, ...};
pub use cipher::AuthenticatedCipher;
pub use encryption::{decrypt, decrypt_untagged, encrypt, encrypt_untagged};
pub use envelope::EncryptedEnvelope;
pub use kdf::{generate_salt, KeyDerivation, KeyDerivationParams};
pub use keys::{DerivedKey, KeyPurpose, KEY_LEN};
pub use memory::{constant_time_eq, is_wiped, secure_copy, wipe, SecretBytes};
