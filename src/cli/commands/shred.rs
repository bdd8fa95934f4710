//! `ghostvault shred` — overwrite and delete files.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::cli::output;
use crate::config::CoreConfig;
use crate::errors::{GhostVaultError, Result};
use crate::shred::SecureDeleter;

/// Execute the `shred` command.
///
/// Paths are processed in order and the command stops at the first
/// failure, so nothing after a failed path is touched.
pub fn execute(config: &CoreConfig, paths: &[PathBuf], recursive: bool) -> Result<()> {
    let deleter = SecureDeleter::new(config)?;

    for path in paths {
        let meta = match path.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                output::warning(&format!("{} does not exist, skipping", path.display()));
                continue;
            }
            // Exists or might exist; the data must not be reported as gone.
            Err(e) => return Err(GhostVaultError::deletion(path, e)),
        };

        // `symlink_metadata` never reports a symlink as a directory, so
        // links to directories are unlinked rather than followed.
        if meta.is_dir() {
            if !recursive {
                return Err(GhostVaultError::deletion(
                    path,
                    "is a directory (use --recursive)",
                ));
            }
            deleter.delete_tree(path)?;
        } else {
            deleter.delete(path)?;
        }

        output::success(&format!(
            "Shredded {} ({} passes)",
            path.display(),
            deleter.passes()
        ));
    }

    Ok(())
}
