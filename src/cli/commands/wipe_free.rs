//! `ghostvault wipe-free-space` — overwrite unused space on a volume.

use std::path::Path;

use crate::cli::output;
use crate::config::CoreConfig;
use crate::errors::{GhostVaultError, Result};
use crate::shred::SecureDeleter;

/// Execute the `wipe-free-space` command.
///
/// The wipe itself is best-effort and never fails; only a missing
/// directory is reported as an error.
pub fn execute(config: &CoreConfig, dir: &Path, max_bytes: u64) -> Result<()> {
    if !dir.is_dir() {
        return Err(GhostVaultError::InvalidArgument(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let deleter = SecureDeleter::new(config)?;
    let written = deleter.wipe_free_space(dir, max_bytes);

    if written == 0 {
        output::warning("No free space was wiped.");
        output::tip("Run with RUST_LOG=debug to see why.");
    } else {
        output::success(&format!(
            "Wiped {} of free space in {}",
            output::format_bytes(written),
            dir.display()
        ));
    }

    Ok(())
}
