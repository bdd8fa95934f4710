//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! PBKDF2 is iterated HMAC; the iteration count (210 000 by default,
//! never below 100 000 in production) makes every guess slow.  Three
//! flavours are offered:
//!
//! - `derive`: random salt + purpose tag, for independent key pairs.
//! - `derive_deterministic`: fixed salt, so the vault unlock key can be
//!   recomputed from the password alone after a restart.
//! - `derive_variants` / `recover`: the earlier parameter sets a vault
//!   may have been written with, tried in a fixed order.  Each scheme
//!   yields a matched encryption/authentication pair.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::keys::{DerivedKey, KeyPurpose, KEY_LEN};
use super::memory::SecretBytes;
use crate::config::settings::{CoreConfig, PBKDF2_HMAC_SHA256};
use crate::errors::{GhostVaultError, Result};

/// Fixed salt for deterministic derivation.  Changing it orphans every
/// existing vault, so it only ever moves into `variants`.
const DETERMINISTIC_SALT: &[u8; 32] = b"ghostvault/deterministic-salt/v1";

/// Iteration counts used by earlier releases, oldest first.
const LEGACY_ITERATIONS: [u32; 2] = [10_000, 65_536];

/// Domain prefix for the password-derived salt variant.
const PASSWORD_SALT_PREFIX: &[u8] = b"ghostvault-salt:";

/// Everything needed to reproduce a derived key (never the key itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDerivationParams {
    pub algorithm: String,
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub key_len: usize,
}

/// One way a vault key pair may have been derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationVariant {
    /// PBKDF2 with the fixed deterministic salt at this iteration count.
    FixedSalt(u32),
    /// PBKDF2 at the configured count, salt derived from the password.
    PasswordSalt,
    /// A single SHA-256 of the password.
    Sha256Only,
}

/// PBKDF2 key derivation bound to one `CoreConfig`.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    iterations: u32,
    previous_iterations: Vec<u32>,
    salt_len: usize,
}

impl KeyDerivation {
    /// Build a deriver from `config`.
    ///
    /// Only structural problems are rejected here (unknown algorithm,
    /// zero iterations, wrong key length).  Security floors are the job of
    /// `CoreConfig::validate`, so tests can run with fast parameters.
    pub fn new(config: &CoreConfig) -> Result<Self> {
        if config.kdf_algorithm != PBKDF2_HMAC_SHA256 {
            return Err(GhostVaultError::Configuration(format!(
                "unsupported KDF algorithm '{}'",
                config.kdf_algorithm
            )));
        }
        if config.kdf_iterations == 0 {
            return Err(GhostVaultError::Configuration(
                "kdf_iterations must be at least 1".into(),
            ));
        }
        if config.key_len() != KEY_LEN {
            return Err(GhostVaultError::Configuration(format!(
                "key length must be {} bits (got {})",
                KEY_LEN * 8,
                config.key_len_bits
            )));
        }
        if config.salt_len == 0 {
            return Err(GhostVaultError::Configuration(
                "salt_len must be non-zero".into(),
            ));
        }

        if config.previous_kdf_iterations.contains(&0) {
            return Err(GhostVaultError::Configuration(
                "previous_kdf_iterations must not contain 0".into(),
            ));
        }

        Ok(Self {
            iterations: config.kdf_iterations,
            previous_iterations: config.previous_kdf_iterations.clone(),
            salt_len: config.salt_len,
        })
    }

    /// Configured iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Configured salt length in bytes.
    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// Derive a key for `purpose` from `password` and `salt`.
    ///
    /// The effective PBKDF2 salt is `salt || purpose.tag()`.
    pub fn derive(&self, password: &[u8], salt: &[u8], purpose: KeyPurpose) -> Result<DerivedKey> {
        derive_tagged(password, salt, purpose, self.iterations)
    }

    /// Derive the encryption key for `password` with the fixed salt.
    ///
    /// The same password always yields the same key.
    pub fn derive_deterministic(&self, password: &[u8]) -> Result<DerivedKey> {
        self.derive(password, DETERMINISTIC_SALT, KeyPurpose::Encryption)
    }

    /// Derive the deterministic encryption and authentication keys.
    pub fn derive_deterministic_pair(&self, password: &[u8]) -> Result<(DerivedKey, DerivedKey)> {
        let enc = self.derive(password, DETERMINISTIC_SALT, KeyPurpose::Encryption)?;
        let auth = self.derive(password, DETERMINISTIC_SALT, KeyPurpose::Authentication)?;
        Ok((enc, auth))
    }

    /// Hash `password` for storage-safe verification.
    ///
    /// No purpose tag is mixed in; the record salt is used as-is.  The
    /// iteration count is explicit because stored records carry their own.
    pub fn hash_password(&self, password: &[u8], salt: &[u8], iterations: u32) -> Result<SecretBytes> {
        if iterations == 0 {
            return Err(GhostVaultError::Configuration(
                "iteration count must be at least 1".into(),
            ));
        }
        if salt.is_empty() {
            return Err(GhostVaultError::Configuration(
                "salt must not be empty".into(),
            ));
        }

        let mut hash = SecretBytes::zeroed(KEY_LEN);
        pbkdf2_hmac::<Sha256>(password, salt, iterations, hash.as_mut_bytes());
        Ok(hash)
    }

    /// The derivation schemes `recover` tries, in order:
    ///
    /// 0. fixed salt at the configured iteration count
    /// 1. fixed salt at each `previous_kdf_iterations` count (the default
    ///    count unless overridden), then the 10 000 / 65 536 counts of
    ///    earlier releases (duplicates skipped)
    /// 2. configured count, salt = SHA-256(prefix || password)
    /// 3. SHA-256 only, no KDF
    pub fn variants(&self) -> Vec<DerivationVariant> {
        let mut counts: Vec<u32> = vec![self.iterations];
        let older = self
            .previous_iterations
            .iter()
            .copied()
            .chain(LEGACY_ITERATIONS);
        for count in older {
            if !counts.contains(&count) {
                counts.push(count);
            }
        }

        let mut variants: Vec<DerivationVariant> = counts
            .into_iter()
            .map(DerivationVariant::FixedSalt)
            .collect();
        variants.push(DerivationVariant::PasswordSalt);
        variants.push(DerivationVariant::Sha256Only);
        variants
    }

    /// Derive the (encryption, authentication) pair for one scheme.
    ///
    /// Both keys come from the same scheme, so an envelope tagged under
    /// that scheme verifies with the returned pair.
    pub fn derive_variant_pair(
        &self,
        password: &[u8],
        variant: DerivationVariant,
    ) -> Result<(DerivedKey, DerivedKey)> {
        match variant {
            DerivationVariant::FixedSalt(iterations) => Ok((
                derive_tagged(password, DETERMINISTIC_SALT, KeyPurpose::Encryption, iterations)?,
                derive_tagged(password, DETERMINISTIC_SALT, KeyPurpose::Authentication, iterations)?,
            )),
            DerivationVariant::PasswordSalt => {
                let mut password_salt = Zeroizing::new([0u8; 32]);
                let mut digest = Sha256::new()
                    .chain_update(PASSWORD_SALT_PREFIX)
                    .chain_update(password)
                    .finalize();
                password_salt.copy_from_slice(&digest);
                digest.as_mut_slice().zeroize();

                Ok((
                    self.derive(password, &password_salt[..], KeyPurpose::Encryption)?,
                    self.derive(password, &password_salt[..], KeyPurpose::Authentication)?,
                ))
            }
            DerivationVariant::Sha256Only => {
                // The encryption key is the bare digest; the
                // authentication key appends the purpose tag.
                let enc = sha256_key(&[password], KeyPurpose::Encryption)?;
                let auth = sha256_key(
                    &[password, KeyPurpose::Authentication.tag()],
                    KeyPurpose::Authentication,
                )?;
                Ok((enc, auth))
            }
        }
    }

    /// Every pair from `variants`, in order.
    pub fn derive_variants(&self, password: &[u8]) -> Result<Vec<(DerivedKey, DerivedKey)>> {
        self.variants()
            .into_iter()
            .map(|variant| self.derive_variant_pair(password, variant))
            .collect()
    }

    /// Derive pairs in `variants` order and return the first one
    /// `validate` accepts, together with its index.
    ///
    /// Pairs are derived one at a time; rejected pairs are dropped (and
    /// wiped) before the next one is computed.
    pub fn recover<F>(
        &self,
        password: &[u8],
        mut validate: F,
    ) -> Result<Option<(usize, (DerivedKey, DerivedKey))>>
    where
        F: FnMut(&DerivedKey, &DerivedKey) -> bool,
    {
        for (index, variant) in self.variants().into_iter().enumerate() {
            let (enc, auth) = self.derive_variant_pair(password, variant)?;
            if validate(&enc, &auth) {
                tracing::debug!(variant = index, ?variant, "recovered key pair");
                return Ok(Some((index, (enc, auth))));
            }
        }
        Ok(None)
    }

    /// Parameters that reproduce a `derive` call with `salt`.
    pub fn params(&self, salt: &[u8]) -> KeyDerivationParams {
        KeyDerivationParams {
            algorithm: PBKDF2_HMAC_SHA256.to_string(),
            salt: salt.to_vec(),
            iterations: self.iterations,
            key_len: KEY_LEN,
        }
    }

    /// Generate a random salt of the configured length.
    pub fn generate_salt(&self) -> Vec<u8> {
        generate_salt(self.salt_len)
    }
}

/// SHA-256 over the concatenated `parts`, as a key.
fn sha256_key(parts: &[&[u8]], purpose: KeyPurpose) -> Result<DerivedKey> {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(*part);
    }
    let mut digest = hasher.finalize();
    let key = DerivedKey::from_slice(&digest, purpose);
    digest.as_mut_slice().zeroize();
    key.ok_or_else(|| GhostVaultError::Crypto("SHA-256 digest is not a key".into()))
}

/// PBKDF2 with the purpose tag appended to `salt`.
fn derive_tagged(
    password: &[u8],
    salt: &[u8],
    purpose: KeyPurpose,
    iterations: u32,
) -> Result<DerivedKey> {
    if salt.is_empty() {
        return Err(GhostVaultError::Configuration(
            "salt must not be empty".into(),
        ));
    }

    let tag = purpose.tag();
    let mut effective_salt = Zeroizing::new(Vec::with_capacity(salt.len() + tag.len()));
    effective_salt.extend_from_slice(salt);
    effective_salt.extend_from_slice(tag);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, &effective_salt, iterations, &mut key);

    let derived = DerivedKey::new(key, purpose);
    key.zeroize();
    Ok(derived)
}

/// Generate `len` cryptographically random bytes for use as a salt.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    rand::rng().fill_bytes(&mut salt);
    salt
}
