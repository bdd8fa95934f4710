//! `ghostvault status` — show the provisioning state of the vault directory.

use console::style;

use crate::cli::{output, Cli};
use crate::config::CoreConfig;
use crate::errors::Result;
use crate::store::{CredentialStore, StoreState};

/// Execute the `status` command.
pub fn execute(cli: &Cli, config: &CoreConfig) -> Result<()> {
    let store = CredentialStore::new(&cli.vault_dir, config)?;
    let state = store.state();

    println!("{}", style(state.as_str()).bold());

    match state {
        StoreState::Unprovisioned => {
            output::info(&format!("No credentials in {}", cli.vault_dir.display()));
        }
        StoreState::NeedsMigration => {
            output::warning("A plaintext password file is present.");
            output::tip("Run `ghostvault migrate` to hash it and remove it securely.");
        }
        StoreState::Provisioned => {
            // Surface a leftover plaintext file even when a record exists.
            if store.legacy_path().exists() {
                output::warning("A leftover plaintext password file is present.");
                output::tip("Run `ghostvault migrate` to remove it securely.");
            }
        }
    }

    Ok(())
}
