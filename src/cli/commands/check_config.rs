//! `ghostvault check-config` — validate the vault's `.ghostvault.toml`.

use console::style;

use crate::cli::{load_config, output, Cli};
use crate::config::CoreConfig;
use crate::errors::Result;

/// Execute the `check-config` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let path = cli.vault_dir.join(CoreConfig::FILE_NAME);
    if !path.exists() {
        output::info(&format!("No {} found, using defaults.", CoreConfig::FILE_NAME));
    }

    let config = load_config(cli)?;

    println!("  {:<26}{}", style("kdf_algorithm").dim(), config.kdf_algorithm);
    println!("  {:<26}{}", style("kdf_iterations").dim(), config.kdf_iterations);
    println!(
        "  {:<26}{:?}",
        style("previous_kdf_iterations").dim(),
        config.previous_kdf_iterations
    );
    println!("  {:<26}{}", style("salt_len").dim(), config.salt_len);
    println!("  {:<26}{}", style("key_len_bits").dim(), config.key_len_bits);
    println!("  {:<26}{}", style("iv_len").dim(), config.iv_len);
    println!("  {:<26}{}", style("tag_len").dim(), config.tag_len);
    println!("  {:<26}{}", style("delete_passes").dim(), config.delete_passes);
    println!(
        "  {:<26}{}",
        style("delete_chunk_size").dim(),
        output::format_bytes(config.delete_chunk_size as u64)
    );
    println!(
        "  {:<26}{}",
        style("free_space_reserve_bytes").dim(),
        output::format_bytes(config.free_space_reserve_bytes)
    );

    output::success("Configuration is valid.");
    Ok(())
}
