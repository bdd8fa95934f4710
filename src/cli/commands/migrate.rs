//! `ghostvault migrate` — replace a plaintext password file with a hashed record.

use crate::cli::{output, Cli};
use crate::config::CoreConfig;
use crate::errors::Result;
use crate::store::CredentialStore;

/// Execute the `migrate` command.
pub fn execute(cli: &Cli, config: &CoreConfig) -> Result<()> {
    let store = CredentialStore::new(&cli.vault_dir, config)?;
    let had_legacy = store.legacy_path().exists();

    if store.migrate_legacy()? {
        output::success("Migrated plaintext passwords to a hashed credential record.");
    } else if had_legacy {
        output::success("Credentials already provisioned; removed the leftover plaintext file.");
    } else {
        output::info("Nothing to migrate.");
    }

    Ok(())
}
