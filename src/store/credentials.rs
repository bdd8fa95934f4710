//! Three-slot password verification store.
//!
//! `CredentialStore` provisions and checks the master, decoy and panic
//! passwords of one vault directory.  Only salted PBKDF2 hashes are kept
//! on disk, in a single record that is replaced atomically.
//!
//! Verification does the same work whether or not a record exists: when
//! the file is missing a placeholder record is hashed against instead.
//! A wrong password and a missing vault both come back as `false`.

use std::path::{Path, PathBuf};

use super::format::{self, CredentialRecord, Slot, SlotRecord, SALT_LEN};
use super::legacy::{self, LEGACY_FILE_NAME};
use crate::config::CoreConfig;
use crate::crypto::kdf::KeyDerivation;
use crate::crypto::memory::constant_time_eq;
use crate::errors::{GhostVaultError, Result};
use crate::shred::SecureDeleter;

/// File name of the credential record inside the vault root.
pub const CREDENTIAL_FILE_NAME: &str = "credentials.bin";

/// What is on disk in a vault root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Neither a record nor a legacy file.
    Unprovisioned,
    /// Only the legacy plaintext file; run `migrate_legacy`.
    NeedsMigration,
    /// A credential record exists.
    Provisioned,
}

impl StoreState {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreState::Unprovisioned => "unprovisioned",
            StoreState::NeedsMigration => "needs-migration",
            StoreState::Provisioned => "provisioned",
        }
    }
}

/// Credential store for one vault root directory.
pub struct CredentialStore {
    root: PathBuf,
    kdf: KeyDerivation,
    deleter: SecureDeleter,
}

impl CredentialStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open the store rooted at `root`.  Nothing is read or written yet.
    pub fn new(root: &Path, config: &CoreConfig) -> Result<Self> {
        if config.salt_len != SALT_LEN {
            return Err(GhostVaultError::Configuration(format!(
                "credential records use {SALT_LEN}-byte salts (salt_len is {})",
                config.salt_len
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            kdf: KeyDerivation::new(config)?,
            deleter: SecureDeleter::new(config)?,
        })
    }

    /// Path to the credential record.
    pub fn credential_path(&self) -> PathBuf {
        self.root.join(CREDENTIAL_FILE_NAME)
    }

    /// Path to the legacy plaintext password file.
    pub fn legacy_path(&self) -> PathBuf {
        self.root.join(LEGACY_FILE_NAME)
    }

    /// Classify the vault root by which files are present.
    pub fn state(&self) -> StoreState {
        if self.credential_path().exists() {
            StoreState::Provisioned
        } else if self.legacy_path().exists() {
            StoreState::NeedsMigration
        } else {
            StoreState::Unprovisioned
        }
    }

    // ------------------------------------------------------------------
    // Provisioning
    // ------------------------------------------------------------------

    /// Hash all three passwords and write a fresh record, replacing any
    /// previous one.  A legacy plaintext file is securely deleted
    /// afterwards.
    ///
    /// The three passwords must be non-empty and pairwise different,
    /// otherwise one password would unlock two slots.
    pub fn provision(&self, master: &[u8], decoy: &[u8], panic: &[u8]) -> Result<()> {
        if master.is_empty() || decoy.is_empty() || panic.is_empty() {
            return Err(GhostVaultError::InvalidArgument(
                "passwords must not be empty".into(),
            ));
        }
        if constant_time_eq(master, decoy)
            || constant_time_eq(master, panic)
            || constant_time_eq(decoy, panic)
        {
            return Err(GhostVaultError::InvalidArgument(
                "master, decoy and panic passwords must all differ".into(),
            ));
        }

        std::fs::create_dir_all(&self.root)?;

        let iterations = self.kdf.iterations();
        let record = CredentialRecord {
            iterations,
            master: self.hash_new_slot(master, iterations)?,
            decoy: self.hash_new_slot(decoy, iterations)?,
            panic: self.hash_new_slot(panic, iterations)?,
        };

        format::write_record(&self.credential_path(), &record)?;
        tracing::info!(root = %self.root.display(), "credential record provisioned");

        self.deleter.delete(&self.legacy_path())?;
        Ok(())
    }

    fn hash_new_slot(&self, password: &[u8], iterations: u32) -> Result<SlotRecord> {
        let salt: [u8; SALT_LEN] = self
            .kdf
            .generate_salt()
            .try_into()
            .map_err(|_| GhostVaultError::Configuration("salt length mismatch".into()))?;
        let hash = self.kdf.hash_password(password, &salt, iterations)?;
        SlotRecord::new(salt, hash)
    }

    /// Move a legacy plaintext file into a hashed record.
    ///
    /// Returns `true` if a migration happened.  If a record already
    /// exists, a leftover legacy file is only securely deleted and
    /// `false` is returned; so is the case where there is nothing to
    /// migrate.
    pub fn migrate_legacy(&self) -> Result<bool> {
        let legacy_path = self.legacy_path();

        if self.credential_path().exists() {
            if legacy_path.exists() {
                tracing::warn!(root = %self.root.display(), "removing leftover legacy password file");
                self.deleter.delete(&legacy_path)?;
            }
            return Ok(false);
        }

        let Some(passwords) = legacy::read_legacy(&legacy_path)? else {
            return Ok(false);
        };

        self.provision(
            passwords.master.as_bytes(),
            passwords.decoy.as_bytes(),
            passwords.panic.as_bytes(),
        )?;
        tracing::info!(root = %self.root.display(), "migrated legacy password file");
        Ok(true)
    }

    /// Securely delete the record and any legacy file.
    pub fn destroy(&self) -> Result<()> {
        self.deleter.delete(&self.credential_path())?;
        self.deleter.delete(&self.legacy_path())?;
        tracing::info!(root = %self.root.display(), "credential store destroyed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Load the record, or `None` if the vault is not provisioned.
    pub fn load(&self) -> Result<Option<CredentialRecord>> {
        format::read_record(&self.credential_path())
    }

    /// Check `password` against `slot`.
    ///
    /// Returns `false` both for a wrong password and for a missing
    /// record; both cases run one full KDF and one constant-time compare.
    pub fn verify(&self, password: &[u8], slot: Slot) -> Result<bool> {
        let (record, present) = self.load_or_placeholder()?;
        let matches = self.check_slot(&record, slot, password)?;
        Ok(matches & present)
    }

    /// Find which slot `password` opens, if any.
    ///
    /// Always hashes against all three slots so the time taken does not
    /// depend on which one (if any) matches.
    pub fn identify(&self, password: &[u8]) -> Result<Option<Slot>> {
        let (record, present) = self.load_or_placeholder()?;

        let mut found = None;
        for slot in Slot::ALL {
            let matches = self.check_slot(&record, slot, password)?;
            if matches & present {
                found = Some(slot);
            }
        }
        Ok(found)
    }

    fn load_or_placeholder(&self) -> Result<(CredentialRecord, bool)> {
        Ok(match self.load()? {
            Some(record) => (record, true),
            None => (CredentialRecord::placeholder(self.kdf.iterations()), false),
        })
    }

    fn check_slot(&self, record: &CredentialRecord, slot: Slot, password: &[u8]) -> Result<bool> {
        let stored = record.slot(slot);
        let hash = self
            .kdf
            .hash_password(password, &stored.salt, record.iterations)?;
        Ok(hash.ct_eq(stored.hash()))
    }
}
