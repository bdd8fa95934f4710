use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{GhostVaultError, Result};

/// Identifier of the only supported password KDF.
pub const PBKDF2_HMAC_SHA256: &str = "PBKDF2-HMAC-SHA256";

/// PBKDF2 iteration count used when none is configured.
pub const DEFAULT_KDF_ITERATIONS: u32 = 210_000;

/// Minimum PBKDF2 iteration count accepted at startup.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Largest iteration count accepted in config or in a stored record.
pub const MAX_KDF_ITERATIONS: u32 = 100 * DEFAULT_KDF_ITERATIONS;

/// Minimum salt length in bytes.
pub const MIN_SALT_LEN: usize = 16;

/// Salt length stored in credential records.
pub const REQUIRED_SALT_LEN: usize = 32;

/// Required key length in bits (AES-256 / HMAC-SHA256 keys).
pub const REQUIRED_KEY_LEN_BITS: usize = 256;

/// AES-GCM nonce size in bytes.
pub const REQUIRED_IV_LEN: usize = 12;

/// HMAC-SHA256 tag size in bytes.
pub const REQUIRED_TAG_LEN: usize = 32;

/// Minimum number of overwrite passes for secure deletion.
pub const MIN_DELETE_PASSES: u32 = 3;

/// Minimum free space left untouched by `wipe_free_space` (100 MiB).
pub const MIN_FREE_SPACE_RESERVE: u64 = 100 * 1024 * 1024;

/// Crypto and storage parameters for the vault core.
///
/// Built once at process start and passed by reference to every component.
/// Every field has a production default so GhostVault works without any
/// config file at all. `validate` enforces the security floors; the
/// binary refuses to start when it fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// KDF algorithm identifier.
    #[serde(default = "default_kdf_algorithm")]
    pub kdf_algorithm: String,

    /// PBKDF2 iteration count (default: 210 000).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Iteration counts this vault's unlock key may have been derived
    /// with before `kdf_iterations` was changed.  Tried in order during
    /// key recovery.  Add the old value here when raising the count.
    #[serde(default = "default_previous_kdf_iterations")]
    pub previous_kdf_iterations: Vec<u32>,

    /// Length of random salts in bytes (must be 32, the record salt size).
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,

    /// Derived key length in bits (must be 256).
    #[serde(default = "default_key_len_bits")]
    pub key_len_bits: usize,

    /// Cipher nonce length in bytes (must be 12).
    #[serde(default = "default_iv_len")]
    pub iv_len: usize,

    /// MAC tag length in bytes (must be 32).
    #[serde(default = "default_tag_len")]
    pub tag_len: usize,

    /// Overwrite passes per securely deleted file (default: 3).
    #[serde(default = "default_delete_passes")]
    pub delete_passes: u32,

    /// Write chunk size for overwrite passes (default: 64 KiB).
    #[serde(default = "default_delete_chunk_size")]
    pub delete_chunk_size: usize,

    /// Free space `wipe_free_space` never consumes (default: 100 MiB).
    #[serde(default = "default_free_space_reserve")]
    pub free_space_reserve_bytes: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_kdf_algorithm() -> String {
    PBKDF2_HMAC_SHA256.to_string()
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

fn default_previous_kdf_iterations() -> Vec<u32> {
    vec![DEFAULT_KDF_ITERATIONS]
}

fn default_salt_len() -> usize {
    32
}

fn default_key_len_bits() -> usize {
    REQUIRED_KEY_LEN_BITS
}

fn default_iv_len() -> usize {
    REQUIRED_IV_LEN
}

fn default_tag_len() -> usize {
    REQUIRED_TAG_LEN
}

fn default_delete_passes() -> u32 {
    3
}

fn default_delete_chunk_size() -> usize {
    64 * 1024
}

fn default_free_space_reserve() -> u64 {
    MIN_FREE_SPACE_RESERVE
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf_algorithm: default_kdf_algorithm(),
            kdf_iterations: default_kdf_iterations(),
            previous_kdf_iterations: default_previous_kdf_iterations(),
            salt_len: default_salt_len(),
            key_len_bits: default_key_len_bits(),
            iv_len: default_iv_len(),
            tag_len: default_tag_len(),
            delete_passes: default_delete_passes(),
            delete_chunk_size: default_delete_chunk_size(),
            free_space_reserve_bytes: default_free_space_reserve(),
        }
    }
}

impl CoreConfig {
    /// Name of the config file we look for in the vault root.
    pub const FILE_NAME: &'static str = ".ghostvault.toml";

    /// Load and validate `<vault_root>/.ghostvault.toml`.
    ///
    /// If the file does not exist, validated defaults are returned.
    /// If it exists but cannot be parsed, or a value is below its
    /// security floor, an error is returned.
    pub fn load(vault_root: &Path) -> Result<Self> {
        let config_path = vault_root.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let config: CoreConfig = toml::from_str(&contents).map_err(|e| {
            GhostVaultError::Serialization(format!(
                "Failed to parse {}: {e}",
                config_path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check every parameter against its minimum-security floor.
    pub fn validate(&self) -> Result<()> {
        if self.kdf_algorithm != PBKDF2_HMAC_SHA256 {
            return Err(GhostVaultError::Configuration(format!(
                "unsupported KDF algorithm '{}'",
                self.kdf_algorithm
            )));
        }
        if self.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(GhostVaultError::Configuration(format!(
                "kdf_iterations must be at least {MIN_KDF_ITERATIONS} (got {})",
                self.kdf_iterations
            )));
        }
        if self.kdf_iterations > MAX_KDF_ITERATIONS {
            return Err(GhostVaultError::Configuration(format!(
                "kdf_iterations must be at most {MAX_KDF_ITERATIONS} (got {})",
                self.kdf_iterations
            )));
        }
        if self.previous_kdf_iterations.contains(&0) {
            return Err(GhostVaultError::Configuration(
                "previous_kdf_iterations must not contain 0".into(),
            ));
        }
        if self.salt_len < MIN_SALT_LEN {
            return Err(GhostVaultError::Configuration(format!(
                "salt_len must be at least {MIN_SALT_LEN} bytes (got {})",
                self.salt_len
            )));
        }
        if self.salt_len != REQUIRED_SALT_LEN {
            return Err(GhostVaultError::Configuration(format!(
                "salt_len must be {REQUIRED_SALT_LEN} to match credential records (got {})",
                self.salt_len
            )));
        }
        if self.key_len_bits != REQUIRED_KEY_LEN_BITS {
            return Err(GhostVaultError::Configuration(format!(
                "key_len_bits must be {REQUIRED_KEY_LEN_BITS} (got {})",
                self.key_len_bits
            )));
        }
        if self.iv_len != REQUIRED_IV_LEN {
            return Err(GhostVaultError::Configuration(format!(
                "iv_len must be {REQUIRED_IV_LEN} for AES-GCM (got {})",
                self.iv_len
            )));
        }
        if self.tag_len != REQUIRED_TAG_LEN {
            return Err(GhostVaultError::Configuration(format!(
                "tag_len must be {REQUIRED_TAG_LEN} for HMAC-SHA256 (got {})",
                self.tag_len
            )));
        }
        if self.delete_passes < MIN_DELETE_PASSES {
            return Err(GhostVaultError::Configuration(format!(
                "delete_passes must be at least {MIN_DELETE_PASSES} (got {})",
                self.delete_passes
            )));
        }
        if self.delete_chunk_size == 0 {
            return Err(GhostVaultError::Configuration(
                "delete_chunk_size must be non-zero".into(),
            ));
        }
        if self.free_space_reserve_bytes < MIN_FREE_SPACE_RESERVE {
            return Err(GhostVaultError::Configuration(format!(
                "free_space_reserve_bytes must be at least {MIN_FREE_SPACE_RESERVE} (got {})",
                self.free_space_reserve_bytes
            )));
        }
        Ok(())
    }

    /// Derived key length in bytes.
    pub fn key_len(&self) -> usize {
        self.key_len_bits / 8
    }
}

// ── Tests ────────────────────────────────────────────────────────────
