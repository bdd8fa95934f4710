//! The pre-hashing plaintext password file.
//!
//! Old vaults kept the three passwords in `passwords.json`:
//!
//! ```json
//! { "master": "...", "decoy": "...", "panic": "..." }
//! ```
//!
//! It is only ever read to migrate it into a credential record, after
//! which it is securely deleted.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{GhostVaultError, Result};

/// File name of the legacy plaintext password file.
pub const LEGACY_FILE_NAME: &str = "passwords.json";

/// Plaintext passwords read from the legacy file, wiped on drop.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LegacyPasswords {
    pub master: String,
    pub decoy: String,
    pub panic: String,
}

impl std::fmt::Debug for LegacyPasswords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LegacyPasswords([REDACTED])")
    }
}

/// Read the legacy file at `path`, or `None` if it does not exist.
pub fn read_legacy(path: &Path) -> Result<Option<LegacyPasswords>> {
    let data = match fs::read(path) {
        Ok(data) => Zeroizing::new(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|_| GhostVaultError::Format("legacy password file is not valid".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_legacy(&dir.path().join(LEGACY_FILE_NAME)).unwrap().is_none());
    }

    #[test]
    fn parses_three_passwords() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LEGACY_FILE_NAME);
        fs::write(&path, r#"{"master":"m-pw","decoy":"d-pw","panic":"p-pw"}"#).unwrap();

        let legacy = read_legacy(&path).unwrap().unwrap();
        assert_eq!(legacy.master, "m-pw");
        assert_eq!(legacy.decoy, "d-pw");
        assert_eq!(legacy.panic, "p-pw");
    }

    #[test]
    fn malformed_file_is_format_error_without_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LEGACY_FILE_NAME);
        fs::write(&path, r#"{"master":"leaky-secret"}"#).unwrap();

        let err = read_legacy(&path).unwrap_err();
        assert!(matches!(err, GhostVaultError::Format(_)));
        assert!(!err.to_string().contains("leaky-secret"));
    }

    #[test]
    fn debug_is_redacted() {
        let legacy = LegacyPasswords {
            master: "a".into(),
            decoy: "b".into(),
            panic: "c".into(),
        };
        assert_eq!(format!("{legacy:?}"), "LegacyPasswords([REDACTED])");
    }
}
