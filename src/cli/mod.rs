//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::config::CoreConfig;
use crate::errors::Result;

/// Default cap for `wipe-free-space` when `--max-bytes` is not given.
pub const DEFAULT_WIPE_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// GhostVault CLI: maintenance commands for a deniable vault directory.
#[derive(Parser)]
#[command(
    name = "ghostvault",
    about = "Secure deletion and maintenance for a deniable encrypted vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (default: current directory)
    #[arg(long, default_value = ".", global = true, env = "GHOSTVAULT_DIR")]
    pub vault_dir: PathBuf,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Overwrite and delete files
    Shred {
        /// Files (or directories with --recursive) to destroy
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Descend into directories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Fill free space in a directory with random data, then delete it
    WipeFreeSpace {
        /// Directory on the volume to wipe
        dir: PathBuf,

        /// Stop after writing this many bytes
        #[arg(long, default_value_t = DEFAULT_WIPE_MAX_BYTES)]
        max_bytes: u64,
    },

    /// Show whether the vault directory is provisioned
    Status,

    /// Convert a legacy plaintext password file into a hashed record
    Migrate,

    /// Load and validate the vault's .ghostvault.toml
    CheckConfig,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load and validate the config from the vault directory.
pub fn load_config(cli: &Cli) -> Result<CoreConfig> {
    CoreConfig::load(&cli.vault_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shred_with_multiple_paths() {
        let cli = Cli::try_parse_from(["ghostvault", "shred", "-r", "a", "b"]).unwrap();
        match cli.command {
            Commands::Shred { paths, recursive } => {
                assert_eq!(paths, vec![PathBuf::from("a"), PathBuf::from("b")]);
                assert!(recursive);
            }
            _ => panic!("expected shred"),
        }
    }

    #[test]
    fn shred_requires_a_path() {
        assert!(Cli::try_parse_from(["ghostvault", "shred"]).is_err());
    }

    #[test]
    fn wipe_free_space_defaults_max_bytes() {
        let cli = Cli::try_parse_from(["ghostvault", "wipe-free-space", "/tmp"]).unwrap();
        match cli.command {
            Commands::WipeFreeSpace { max_bytes, .. } => {
                assert_eq!(max_bytes, DEFAULT_WIPE_MAX_BYTES)
            }
            _ => panic!("expected wipe-free-space"),
        }
    }

    #[test]
    fn vault_dir_is_global() {
        let cli = Cli::try_parse_from(["ghostvault", "status", "--vault-dir", "/v"]).unwrap();
        assert_eq!(cli.vault_dir, PathBuf::from("/v"));
    }
}
