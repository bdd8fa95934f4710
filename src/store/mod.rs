//! Store module — multi-password credential storage.
//!
//! This module provides:
//! - The binary credential record and atomic writes (`format`)
//! - The legacy plaintext password file reader (`legacy`)
//! - The high-level `CredentialStore` (`credentials`)

pub mod credentials;
pub mod format;
pub mod legacy;

// Re-export the most commonly used items.
pub use credentials::{CredentialStore, StoreState, CREDENTIAL_FILE_NAME};
pub use format::{CredentialRecord, Slot, SlotRecord};
pub use legacy::LEGACY_FILE_NAME;
