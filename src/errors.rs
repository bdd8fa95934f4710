use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in GhostVault.
#[derive(Debug, Error)]
pub enum GhostVaultError {
    // --- Configuration errors ---
    #[error("Invalid crypto configuration: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // --- Cipher errors ---
    #[error("Cipher used before keys were initialized")]
    NotInitialized,

    #[error("Integrity check failed: data may be corrupted or tampered")]
    Integrity,

    #[error("Cipher operation failed: {0}")]
    Crypto(String),

    // --- Storage errors ---
    #[error("Unrecognized file format: {0}")]
    Format(String),

    // --- Deletion errors ---
    #[error("Secure deletion of {path} failed: {reason} (data may still be on disk)")]
    Deletion { path: PathBuf, reason: String },

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GhostVaultError {
    /// Build a `Deletion` error for `path`.
    pub(crate) fn deletion(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Deletion {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for GhostVault results.
pub type Result<T> = std::result::Result<T, GhostVaultError>;
