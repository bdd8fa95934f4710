//! Binary credential record format and atomic file writes.
//!
//! A `credentials.bin` file has this layout:
//!
//! ```text
//! [GVPW: 4 bytes][iterations: 4 bytes BE]
//! [master salt: 32][master hash: 32]
//! [decoy salt: 32][decoy hash: 32]
//! [panic salt: 32][panic hash: 32]
//! ```
//!
//! - **Magic** (`GVPW`): checked before any other field is trusted.
//! - **Iterations**: PBKDF2 iteration count every hash was made with.
//! - **Slots**: random salt and PBKDF2-HMAC-SHA256 output per password.
//!
//! There is no partial record: all three slots are present or the file
//! is rejected.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::settings::MAX_KDF_ITERATIONS;
use crate::crypto::keys::KEY_LEN;
use crate::crypto::memory::{constant_time_eq, secure_copy, SecretBytes};
use crate::errors::{GhostVaultError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every credential file.
pub const MAGIC: &[u8; 4] = b"GVPW";

/// Per-slot salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Per-slot hash length in bytes (key length).
pub const HASH_LEN: usize = KEY_LEN;

/// Fixed-size prefix: 4 (magic) + 4 (iterations).
const PREFIX_LEN: usize = 8;

/// Exact size of a credential file.
pub const RECORD_LEN: usize = PREFIX_LEN + 3 * (SALT_LEN + HASH_LEN);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One of the three password classes a vault accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Master,
    Decoy,
    Panic,
}

impl Slot {
    /// All slots, in on-disk order.
    pub const ALL: [Slot; 3] = [Slot::Master, Slot::Decoy, Slot::Panic];

    pub fn name(self) -> &'static str {
        match self {
            Slot::Master => "master",
            Slot::Decoy => "decoy",
            Slot::Panic => "panic",
        }
    }
}

/// Salt and verification hash for one slot.
pub struct SlotRecord {
    pub salt: [u8; SALT_LEN],
    hash: SecretBytes,
}

impl SlotRecord {
    /// Pair a salt with its hash; the hash must be `HASH_LEN` bytes.
    pub fn new(salt: [u8; SALT_LEN], hash: SecretBytes) -> Result<Self> {
        if hash.len() != HASH_LEN {
            return Err(GhostVaultError::Format(format!(
                "slot hash must be {HASH_LEN} bytes (got {})",
                hash.len()
            )));
        }
        Ok(Self { salt, hash })
    }

    pub fn hash(&self) -> &[u8] {
        self.hash.as_bytes()
    }
}

impl PartialEq for SlotRecord {
    fn eq(&self, other: &Self) -> bool {
        self.salt == other.salt && constant_time_eq(self.hash(), other.hash())
    }
}

impl std::fmt::Debug for SlotRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotRecord")
            .field("salt_len", &self.salt.len())
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

/// The full three-slot credential record.
#[derive(Debug, PartialEq)]
pub struct CredentialRecord {
    pub iterations: u32,
    pub master: SlotRecord,
    pub decoy: SlotRecord,
    pub panic: SlotRecord,
}

impl CredentialRecord {
    /// The salt/hash pair for `slot`.
    pub fn slot(&self, slot: Slot) -> &SlotRecord {
        match slot {
            Slot::Master => &self.master,
            Slot::Decoy => &self.decoy,
            Slot::Panic => &self.panic,
        }
    }

    /// A record that matches no password, with the same shape and cost
    /// as a real one.  Used when no vault exists so verification still
    /// does the full amount of work.
    pub fn placeholder(iterations: u32) -> Self {
        let random_slot = || {
            let mut salt = [0u8; SALT_LEN];
            let mut hash = SecretBytes::zeroed(HASH_LEN);
            let mut rng = rand::rng();
            rng.fill_bytes(&mut salt);
            rng.fill_bytes(hash.as_mut_bytes());
            SlotRecord { salt, hash }
        };

        Self {
            iterations,
            master: random_slot(),
            decoy: random_slot(),
            panic: random_slot(),
        }
    }

    /// Encode to the on-disk layout.  The buffer holds hashes, so it is
    /// wiped when dropped.
    pub fn serialize(&self) -> Zeroizing<Vec<u8>> {
        let mut buf = Zeroizing::new(Vec::with_capacity(RECORD_LEN));

        buf.extend_from_slice(MAGIC); // 4 bytes
        buf.extend_from_slice(&self.iterations.to_be_bytes()); // 4 bytes BE
        for slot in Slot::ALL {
            let record = self.slot(slot);
            buf.extend_from_slice(&record.salt);
            buf.extend_from_slice(record.hash());
        }

        buf
    }

    /// Decode the on-disk layout.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        // --- Magic first, before any other field is trusted ---

        if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
            return Err(GhostVaultError::Format(
                "missing GVPW magic bytes".into(),
            ));
        }

        if data.len() != RECORD_LEN {
            return Err(GhostVaultError::Format(format!(
                "credential record must be {RECORD_LEN} bytes (got {})",
                data.len()
            )));
        }

        let iterations = u32::from_be_bytes(
            data[4..PREFIX_LEN]
                .try_into()
                .map_err(|_| GhostVaultError::Format("bad iteration field".into()))?,
        );
        if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
            return Err(GhostVaultError::Format(format!(
                "iteration count must be between 1 and {MAX_KDF_ITERATIONS} (got {iterations})"
            )));
        }

        // --- Three fixed-size slots ---

        let mut slots = data[PREFIX_LEN..]
            .chunks_exact(SALT_LEN + HASH_LEN)
            .map(|chunk| {
                let (salt_bytes, hash_bytes) = chunk.split_at(SALT_LEN);
                let mut salt = [0u8; SALT_LEN];
                salt.copy_from_slice(salt_bytes);
                SlotRecord::new(salt, secure_copy(hash_bytes))
            });

        let mut next = || {
            slots
                .next()
                .unwrap_or_else(|| Err(GhostVaultError::Format("missing slot".into())))
        };
        let master = next()?;
        let decoy = next()?;
        let panic = next()?;

        Ok(Self {
            iterations,
            master,
            decoy,
            panic,
        })
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Write a credential record to disk **atomically**.
///
/// 1. Serialize the record.
/// 2. Write it to a uniquely named temp file in the same directory
///    (owner-only permissions on Unix) and sync it.
/// 3. Rename the temp file over the target path and sync the directory.
///
/// Readers see either the old record or the new one, never a mix, even
/// when two writers race.
pub fn write_record(path: &Path, record: &CredentialRecord) -> Result<()> {
    let buf = record.serialize();

    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.{:016x}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        rand::rng().next_u64()
    ));

    let written = write_synced(&tmp_path, &buf).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    // Persist the rename itself.
    #[cfg(unix)]
    {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Read the credential record at `path`, or `None` if there is none.
pub fn read_record(path: &Path) -> Result<Option<CredentialRecord>> {
    let data = match fs::read(path) {
        Ok(data) => Zeroizing::new(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    CredentialRecord::deserialize(&data).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(iterations: u32) -> CredentialRecord {
        let slot = |fill: u8| {
            SlotRecord::new([fill; SALT_LEN], SecretBytes::new(vec![fill ^ 0xFF; HASH_LEN])).unwrap()
        };
        CredentialRecord {
            iterations,
            master: slot(1),
            decoy: slot(2),
            panic: slot(3),
        }
    }

    #[test]
    fn layout_matches_documentation() {
        let bytes = record(0x0001_86A0).serialize();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(&bytes[..4], b"GVPW");
        assert_eq!(&bytes[4..8], &[0x00, 0x01, 0x86, 0xA0]);
        assert_eq!(&bytes[8..40], &[1u8; 32]);
        assert_eq!(&bytes[40..72], &[0xFEu8; 32]);
        assert_eq!(&bytes[72..104], &[2u8; 32]);
        assert_eq!(&bytes[136..168], &[3u8; 32]);
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        for iterations in [1, 100_000, u32::MAX] {
            let original = record(iterations);
            let parsed = CredentialRecord::deserialize(&original.serialize()).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn bad_magic_is_rejected_first() {
        let mut bytes = record(100_000).serialize().to_vec();
        bytes[0] = b'X';
        bytes.truncate(10);
        let err = CredentialRecord::deserialize(&bytes).unwrap_err();
        match err {
            GhostVaultError::Format(msg) => assert!(msg.contains("magic")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn partial_record_is_rejected() {
        let bytes = record(100_000).serialize();
        let err = CredentialRecord::deserialize(&bytes[..RECORD_LEN - 1]).unwrap_err();
        assert!(matches!(err, GhostVaultError::Format(_)));
        assert!(CredentialRecord::deserialize(b"GV").is_err());
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let mut bytes = record(100_000).serialize().to_vec();
        bytes[4..8].copy_from_slice(&0u32.to_be_bytes());
        assert!(CredentialRecord::deserialize(&bytes).is_err());
    }

    #[test]
    fn absurd_iteration_count_is_rejected() {
        let mut bytes = record(100_000).serialize().to_vec();
        bytes[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            CredentialRecord::deserialize(&bytes),
            Err(GhostVaultError::Format(_))
        ));

        bytes[4..8].copy_from_slice(&MAX_KDF_ITERATIONS.to_be_bytes());
        assert!(CredentialRecord::deserialize(&bytes).is_ok());
    }

    #[test]
    fn slot_record_checks_hash_length() {
        assert!(SlotRecord::new([0; SALT_LEN], SecretBytes::zeroed(16)).is_err());
    }

    #[test]
    fn placeholder_has_distinct_random_slots() {
        let placeholder = CredentialRecord::placeholder(1_000);
        assert_eq!(placeholder.iterations, 1_000);
        assert_ne!(placeholder.master, placeholder.decoy);
        assert_eq!(placeholder.serialize().len(), RECORD_LEN);
    }

    #[test]
    fn write_then_read_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.bin");

        assert!(read_record(&path).unwrap().is_none());

        write_record(&path, &record(5)).unwrap();
        write_record(&path, &record(6)).unwrap();

        let loaded = read_record(&path).unwrap().unwrap();
        assert_eq!(loaded, record(6));

        // No temp files left behind.
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("credentials.bin")]);
    }

    #[cfg(unix)]
    #[test]
    fn record_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.bin");
        write_record(&path, &record(5)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
