//! Secure deletion of files, directory trees and free space.
//!
//! A file is overwritten in place several times before it is unlinked.
//! Pass `i` writes pattern `i % 3`: random bytes, all zeros, all ones.
//! Every pass is synced to disk before the next one starts, and the file
//! is only unlinked once every pass succeeded.
//!
//! None of this is cancellable.  If a call is interrupted, treat the
//! target as still holding sensitive data.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::config::CoreConfig;
use crate::errors::{GhostVaultError, Result};

/// Byte pattern written by one overwrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPattern {
    Random,
    Zeros,
    Ones,
}

impl PassPattern {
    /// Pattern for pass number `pass` (0-based).
    pub fn for_pass(pass: u32) -> Self {
        match pass % 3 {
            0 => PassPattern::Random,
            1 => PassPattern::Zeros,
            _ => PassPattern::Ones,
        }
    }

    fn fill(self, buf: &mut [u8]) {
        match self {
            PassPattern::Random => rand::rng().fill_bytes(buf),
            PassPattern::Zeros => buf.fill(0x00),
            PassPattern::Ones => buf.fill(0xFF),
        }
    }
}

/// Multi-pass overwrite-then-unlink deleter.
#[derive(Debug, Clone)]
pub struct SecureDeleter {
    passes: u32,
    chunk_size: usize,
    free_space_reserve: u64,
}

impl SecureDeleter {
    /// Build a deleter from the pass count, chunk size and free-space
    /// reserve in `config`.
    pub fn new(config: &CoreConfig) -> Result<Self> {
        if config.delete_passes == 0 {
            return Err(GhostVaultError::Configuration(
                "delete_passes must be at least 1".into(),
            ));
        }
        if config.delete_chunk_size == 0 {
            return Err(GhostVaultError::Configuration(
                "delete_chunk_size must be non-zero".into(),
            ));
        }

        Ok(Self {
            passes: config.delete_passes,
            chunk_size: config.delete_chunk_size,
            free_space_reserve: config.free_space_reserve_bytes,
        })
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Overwrite and unlink the file at `path`.
    ///
    /// - A missing path is a no-op.
    /// - A symlink is unlinked; its target is left alone.
    /// - A directory is refused (use `delete_tree`).
    /// - A zero-length file is unlinked without overwriting.
    ///
    /// On error the file must be assumed to still hold its data.
    pub fn delete(&self, path: &Path) -> Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(GhostVaultError::deletion(path, e)),
        };

        let file_type = meta.file_type();
        if file_type.is_symlink() {
            fs::remove_file(path).map_err(|e| GhostVaultError::deletion(path, e))?;
            tracing::debug!(path = %path.display(), "unlinked symlink");
            return Ok(());
        }
        if file_type.is_dir() {
            return Err(GhostVaultError::deletion(
                path,
                "is a directory, use delete_tree",
            ));
        }

        let len = meta.len();
        if len > 0 {
            self.overwrite(path, len)?;
        }

        let final_path = scrub_name(path);
        fs::remove_file(&final_path).map_err(|e| unlink_error(path, &final_path, e))?;

        tracing::debug!(path = %path.display(), bytes = len, passes = self.passes, "securely deleted file");
        Ok(())
    }

    /// Run every overwrite pass over the first `len` bytes, then truncate.
    fn overwrite(&self, path: &Path, len: u64) -> Result<()> {
        let fail = |stage: &str, e: std::io::Error| {
            GhostVaultError::deletion(path, format!("{stage}: {e}"))
        };

        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| fail("open for overwrite", e))?;

        let chunk_len = usize::try_from(len).map_or(self.chunk_size, |l| l.min(self.chunk_size));
        let mut chunk = vec![0u8; chunk_len];

        for pass in 0..self.passes {
            let pattern = PassPattern::for_pass(pass);
            file.seek(SeekFrom::Start(0))
                .map_err(|e| fail("seek", e))?;

            write_pattern(&mut file, &mut chunk, pattern, len)
                .map_err(|e| fail("overwrite pass", e))?;

            file.flush().map_err(|e| fail("flush", e))?;
            file.sync_all().map_err(|e| fail("sync", e))?;
        }

        file.set_len(0).map_err(|e| fail("truncate", e))?;
        file.sync_all().map_err(|e| fail("sync", e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trees
    // ------------------------------------------------------------------

    /// Securely delete everything under `path`, depth-first, then `path`.
    ///
    /// Stops at the first failure.  Children already deleted stay deleted.
    pub fn delete_tree(&self, path: &Path) -> Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(GhostVaultError::deletion(path, e)),
        };

        if !meta.is_dir() {
            return self.delete(path);
        }

        let entries = fs::read_dir(path).map_err(|e| GhostVaultError::deletion(path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| GhostVaultError::deletion(path, e))?;
            self.delete_tree(&entry.path())?;
        }

        fs::remove_dir(path).map_err(|e| {
            GhostVaultError::deletion(path, format!("could not remove directory: {e}"))
        })?;
        tracing::debug!(path = %path.display(), "securely deleted directory");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Free space
    // ------------------------------------------------------------------

    /// Best-effort overwrite of free space on the filesystem holding `dir`.
    ///
    /// Fills a temporary file with random data, up to `max_bytes` and
    /// never past the configured reserve, syncs it and securely deletes
    /// it.  Never fails: every error is logged and swallowed, and the
    /// temporary file is removed on every path.  Returns the number of
    /// bytes written, or 0 if the attempt was abandoned.
    pub fn wipe_free_space(&self, dir: &Path, max_bytes: u64) -> u64 {
        match self.try_wipe_free_space(dir, max_bytes) {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "free-space wipe abandoned");
                0
            }
        }
    }

    fn try_wipe_free_space(&self, dir: &Path, max_bytes: u64) -> Result<u64> {
        let budget = match available_space(dir) {
            Some(available) => available
                .saturating_sub(self.free_space_reserve)
                .min(max_bytes),
            None => max_bytes,
        };
        if budget == 0 {
            tracing::debug!(dir = %dir.display(), "no free space to wipe above the reserve");
            return Ok(0);
        }

        let mut guard = TempFileGuard::new(dir.join(format!(
            ".ghostvault-wipe-{:016x}",
            rand::rng().next_u64()
        )));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(guard.path())?;

        let written = fill_random(&mut file, self.chunk_size, budget);
        if let Err(e) = file.sync_all() {
            tracing::debug!(error = %e, "sync of free-space fill failed");
        }
        drop(file);

        if let Err(e) = self.delete(guard.path()) {
            // The file may have been renamed before the unlink failed.
            if let GhostVaultError::Deletion { path, .. } = &e {
                guard.retarget(path.clone());
            }
            return Err(e);
        }
        tracing::info!(dir = %dir.display(), bytes = written, "wiped free space");
        Ok(written)
    }
}

/// Write `len` bytes of `pattern` to `file` in `chunk`-sized pieces.
fn write_pattern(
    file: &mut File,
    chunk: &mut [u8],
    pattern: PassPattern,
    len: u64,
) -> std::io::Result<()> {
    let mut remaining = len;
    while remaining > 0 {
        let n = usize::try_from(remaining).map_or(chunk.len(), |r| r.min(chunk.len()));
        pattern.fill(&mut chunk[..n]);
        file.write_all(&chunk[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Write random data until `budget` bytes or the first write error
/// (usually a full disk).  Returns how much was written.
fn fill_random(out: &mut impl Write, chunk_size: usize, budget: u64) -> u64 {
    let mut chunk = vec![0u8; chunk_size];
    let mut written = 0u64;

    while written < budget {
        let n = usize::try_from(budget - written).map_or(chunk.len(), |r| r.min(chunk.len()));
        rand::rng().fill_bytes(&mut chunk[..n]);
        if let Err(e) = out.write_all(&chunk[..n]) {
            tracing::debug!(error = %e, written, "free-space fill stopped early");
            break;
        }
        written += n as u64;
    }
    written
}

/// Error for an unlink that failed after `path` was renamed to
/// `final_path`.  Names the path the data is actually left under.
fn unlink_error(path: &Path, final_path: &Path, e: std::io::Error) -> GhostVaultError {
    if final_path == path {
        GhostVaultError::deletion(path, format!("unlink failed: {e}"))
    } else {
        GhostVaultError::deletion(
            final_path,
            format!("unlink failed (renamed from {}): {e}", path.display()),
        )
    }
}

/// Rename `path` to a random sibling name so the original file name does
/// not survive in the directory.  Falls back to `path` if renaming fails.
fn scrub_name(path: &Path) -> PathBuf {
    let Some(parent) = path.parent() else {
        return path.to_path_buf();
    };
    let scrubbed = parent.join(format!(".{:016x}", rand::rng().next_u64()));
    match fs::rename(path, &scrubbed) {
        Ok(()) => scrubbed,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not scrub file name");
            path.to_path_buf()
        }
    }
}

/// Removes its file on drop if it still exists.
struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Point the guard at the file's new name after a rename.
    fn retarget(&mut self, path: PathBuf) {
        self.path = path;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if fs::symlink_metadata(&self.path).is_ok() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove free-space wipe file");
            }
        }
    }
}

/// Bytes available to unprivileged users on the filesystem holding `dir`.
#[cfg(unix)]
fn available_space(dir: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(dir.as_os_str().as_bytes()).ok()?;
    // SAFETY: `statvfs` is plain old data, so all-zero is a valid value.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `c_path` is a valid NUL-terminated string and `stat` is a
    // valid, writable `statvfs` for the duration of the call.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }

    #[allow(clippy::unnecessary_cast)]
    Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

#[cfg(not(unix))]
fn available_space(_dir: &Path) -> Option<u64> {
    None
}
