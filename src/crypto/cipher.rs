//! Session-scoped cipher holding the vault's current key pair.
//!
//! `AuthenticatedCipher` owns at most one encryption key and one
//! authentication key.  They are swapped in by `initialize*` and dropped
//! by `clear_keys`.  The lock is only held while the `Arc` is replaced
//! or cloned; a cipher call works on its own clone, so a concurrent
//! `clear_keys` never tears a key out from under it.  The key bytes are
//! zeroized when the last clone goes away.

use std::sync::{Arc, PoisonError, RwLock};

use zeroize::Zeroizing;

use super::encryption::{self, decrypt_untagged};
use super::envelope::EncryptedEnvelope;
use super::kdf::KeyDerivation;
use super::keys::{DerivedKey, KeyPurpose};
use crate::config::CoreConfig;
use crate::errors::{GhostVaultError, Result};

struct SessionKeys {
    encryption: DerivedKey,
    authentication: DerivedKey,
}

/// Encrypts and decrypts with the keys of the current vault session.
pub struct AuthenticatedCipher {
    kdf: KeyDerivation,
    keys: RwLock<Option<Arc<SessionKeys>>>,
}

impl AuthenticatedCipher {
    /// Create an uninitialized cipher.
    pub fn new(config: &CoreConfig) -> Result<Self> {
        Ok(Self {
            kdf: KeyDerivation::new(config)?,
            keys: RwLock::new(None),
        })
    }

    // ------------------------------------------------------------------
    // Key lifecycle
    // ------------------------------------------------------------------

    /// Install a key pair, replacing (and eventually wiping) any previous one.
    pub fn initialize(&self, encryption: DerivedKey, authentication: DerivedKey) -> Result<()> {
        if encryption.purpose() != KeyPurpose::Encryption
            || authentication.purpose() != KeyPurpose::Authentication
        {
            return Err(GhostVaultError::Configuration(
                "cipher keys must be one encryption key and one authentication key".into(),
            ));
        }

        let session = Arc::new(SessionKeys {
            encryption,
            authentication,
        });
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        tracing::debug!("cipher session keys installed");
        Ok(())
    }

    /// Derive the deterministic key pair for `password` and install it.
    pub fn initialize_with_password(&self, password: &[u8]) -> Result<()> {
        let (enc, auth) = self.kdf.derive_deterministic_pair(password)?;
        self.initialize(enc, auth)
    }

    /// Find the derivation scheme that opens `sample` and install its keys.
    ///
    /// `sample` is any envelope known to belong to the vault.  Each scheme
    /// from `KeyDerivation::variants` yields an encryption/authentication
    /// pair; tagged samples must verify and decrypt under the pair,
    /// untagged samples only need the encryption key.  Returns the index
    /// of the scheme that worked (0 = current parameters), or `None` if
    /// none did, in which case the cipher is left untouched.
    pub fn initialize_with_recovery(
        &self,
        password: &[u8],
        sample: &EncryptedEnvelope,
    ) -> Result<Option<usize>> {
        let recovered = self.kdf.recover(password, |enc, auth| {
            if sample.is_authenticated() {
                encryption::decrypt(sample, enc, auth).is_ok()
            } else {
                decrypt_untagged(sample, enc.as_bytes()).is_ok()
            }
        })?;

        match recovered {
            Some((index, (enc, auth))) => {
                if index > 0 {
                    tracing::info!(variant = index, "vault opened with an earlier key derivation");
                }
                self.initialize(enc, auth)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Drop the session keys.
    ///
    /// Calls already in flight finish with the keys they started with;
    /// every later call fails with `NotInitialized`.
    pub fn clear_keys(&self) {
        let previous = self
            .keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::debug!("cipher session keys cleared");
        }
    }

    /// Returns `true` if a key pair is installed.
    pub fn is_initialized(&self) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn session(&self) -> Result<Arc<SessionKeys>> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GhostVaultError::NotInitialized)
    }

    // ------------------------------------------------------------------
    // Cipher operations
    // ------------------------------------------------------------------

    /// Encrypt and tag `plaintext` with the session keys.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        let keys = self.session()?;
        encryption::encrypt(plaintext, &keys.encryption, &keys.authentication)
    }

    /// Verify and decrypt `envelope` with the session keys.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Zeroizing<Vec<u8>>> {
        let keys = self.session()?;
        encryption::decrypt(envelope, &keys.encryption, &keys.authentication)
    }

    /// Encrypt to the versioned wire form.
    pub fn encrypt_to_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(self.encrypt(plaintext)?.to_versioned_bytes())
    }

    /// Decrypt the versioned wire form.
    ///
    /// Untagged versioned envelopes are opened with the session
    /// encryption key alone.
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let envelope = EncryptedEnvelope::from_versioned_bytes(data)?;
        self.decrypt_any(&envelope)
    }

    /// Decrypt the unversioned legacy wire form (tag presence guessed from
    /// the length, see `EncryptedEnvelope::from_bytes`).
    pub fn decrypt_legacy_bytes(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let envelope = EncryptedEnvelope::from_bytes(data)?;
        self.decrypt_any(&envelope)
    }

    fn decrypt_any(&self, envelope: &EncryptedEnvelope) -> Result<Zeroizing<Vec<u8>>> {
        let keys = self.session()?;
        if envelope.is_authenticated() {
            encryption::decrypt(envelope, &keys.encryption, &keys.authentication)
        } else {
            decrypt_untagged(envelope, keys.encryption.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encryption::encrypt_untagged;
    use crate::crypto::kdf::DerivationVariant;

    fn fast_config() -> CoreConfig {
        CoreConfig {
            kdf_iterations: 1_000,
            previous_kdf_iterations: vec![],
            ..CoreConfig::default()
        }
    }

    #[test]
    fn operations_before_initialize_fail() {
        let cipher = AuthenticatedCipher::new(&fast_config()).unwrap();
        assert!(!cipher.is_initialized());
        assert!(matches!(
            cipher.encrypt(b"x"),
            Err(GhostVaultError::NotInitialized)
        ));
        assert!(matches!(
            cipher.decrypt_bytes(&[0x02; 80]),
            Err(GhostVaultError::NotInitialized)
        ));
    }

    #[test]
    fn clear_keys_returns_to_uninitialized() {
        let cipher = AuthenticatedCipher::new(&fast_config()).unwrap();
        cipher.initialize_with_password(b"pw").unwrap();
        let env = cipher.encrypt(b"data").unwrap();

        cipher.clear_keys();
        assert!(!cipher.is_initialized());
        assert!(matches!(
            cipher.decrypt(&env),
            Err(GhostVaultError::NotInitialized)
        ));
    }

    #[test]
    fn initialize_rejects_wrong_purposes() {
        let cipher = AuthenticatedCipher::new(&fast_config()).unwrap();
        let a = DerivedKey::new([1u8; 32], KeyPurpose::Authentication);
        let b = DerivedKey::new([2u8; 32], KeyPurpose::Authentication);
        assert!(cipher.initialize(a, b).is_err());
        assert!(!cipher.is_initialized());
    }

    #[test]
    fn password_initialization_is_deterministic() {
        let config = fast_config();
        let first = AuthenticatedCipher::new(&config).unwrap();
        first.initialize_with_password(b"same").unwrap();
        let bytes = first.encrypt_to_bytes(b"persisted").unwrap();

        // A fresh session (think: after a restart) reads it back.
        let second = AuthenticatedCipher::new(&config).unwrap();
        second.initialize_with_password(b"same").unwrap();
        assert_eq!(second.decrypt_bytes(&bytes).unwrap().as_slice(), b"persisted");
    }

    #[test]
    fn recovery_finds_legacy_variant() {
        let config = fast_config();
        let kdf = KeyDerivation::new(&config).unwrap();
        let (legacy_key, _) = kdf
            .derive_variant_pair(b"old-pw", DerivationVariant::Sha256Only)
            .unwrap();
        let sample = encrypt_untagged(b"legacy record", legacy_key.as_bytes()).unwrap();

        let cipher = AuthenticatedCipher::new(&config).unwrap();
        let index = cipher.initialize_with_recovery(b"old-pw", &sample).unwrap();
        assert_eq!(index, Some(4));
        assert_eq!(
            cipher.decrypt_legacy_bytes(&sample.to_bytes()).unwrap().as_slice(),
            b"legacy record"
        );
    }

    #[test]
    fn recovery_opens_tagged_envelope_from_older_iteration_count() {
        let config = fast_config();
        let kdf = KeyDerivation::new(&config).unwrap();
        let (enc, auth) = kdf
            .derive_variant_pair(b"pw", DerivationVariant::FixedSalt(10_000))
            .unwrap();
        let sample = encryption::encrypt(b"tagged before the upgrade", &enc, &auth).unwrap();

        let cipher = AuthenticatedCipher::new(&config).unwrap();
        assert_eq!(cipher.initialize_with_recovery(b"pw", &sample).unwrap(), Some(1));
        assert_eq!(
            cipher.decrypt(&sample).unwrap().as_slice(),
            b"tagged before the upgrade"
        );

        // New writes use the recovered pair too.
        let fresh = cipher.encrypt(b"after").unwrap();
        assert_eq!(encryption::decrypt(&fresh, &enc, &auth).unwrap().as_slice(), b"after");
    }

    #[test]
    fn recovery_after_iteration_change_uses_previous_count() {
        let before = CoreConfig {
            kdf_iterations: 2_000,
            previous_kdf_iterations: vec![],
            ..CoreConfig::default()
        };
        let writer = AuthenticatedCipher::new(&before).unwrap();
        writer.initialize_with_password(b"pw").unwrap();
        let sample = writer.encrypt(b"written at 2000").unwrap();

        let after = CoreConfig {
            kdf_iterations: 3_000,
            previous_kdf_iterations: vec![2_000],
            ..CoreConfig::default()
        };
        let reader = AuthenticatedCipher::new(&after).unwrap();
        assert_eq!(reader.initialize_with_recovery(b"pw", &sample).unwrap(), Some(1));
        assert_eq!(reader.decrypt(&sample).unwrap().as_slice(), b"written at 2000");
    }

    #[test]
    fn recovery_with_wrong_password_leaves_cipher_empty() {
        let config = fast_config();
        let kdf = KeyDerivation::new(&config).unwrap();
        let key = kdf.derive_deterministic(b"right").unwrap();
        let sample = encrypt_untagged(b"x", key.as_bytes()).unwrap();

        let cipher = AuthenticatedCipher::new(&config).unwrap();
        assert_eq!(cipher.initialize_with_recovery(b"wrong", &sample).unwrap(), None);
        assert!(!cipher.is_initialized());
    }

    #[test]
    fn cipher_is_shareable_across_threads() {
        let cipher = Arc::new(AuthenticatedCipher::new(&fast_config()).unwrap());
        cipher.initialize_with_password(b"pw").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cipher = Arc::clone(&cipher);
                std::thread::spawn(move || {
                    let msg = format!("message {i}");
                    match cipher.encrypt(msg.as_bytes()) {
                        Ok(env) => match cipher.decrypt(&env) {
                            Ok(plain) => assert_eq!(plain.as_slice(), msg.as_bytes()),
                            Err(e) => assert!(matches!(e, GhostVaultError::NotInitialized)),
                        },
                        Err(e) => assert!(matches!(e, GhostVaultError::NotInitialized)),
                    }
                })
            })
            .collect();

        cipher.clear_keys();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
