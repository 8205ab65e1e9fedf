//! File-backed checkpoint store with an integrity-checked envelope.
//!
//! The on-disk format is lifted from DashFlow's checkpoint integrity
//! header: a 20-byte header (magic + format version + CRC32 + length)
//! wraps a bincode payload, so bit flips, truncated writes, and format
//! drift are detected on read rather than silently deserializing garbage.

use super::{CheckpointRecord, CheckpointStore};
use crate::error::{Error, Result};
use crate::model::DeliberationState;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

const MAGIC: &[u8; 4] = b"BOOC";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 20;

/// Integrity failures reading a checkpoint file back.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[non_exhaustive]
pub enum IntegrityError {
    /// File is too small to hold a valid header.
    #[error("checkpoint file too small: {size} bytes (minimum {minimum})")]
    FileTooSmall {
        /// Observed size.
        size: usize,
        /// Minimum required size.
        minimum: usize,
    },
    /// Magic bytes don't match.
    #[error("invalid checkpoint magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: [u8; 4],
        /// Magic bytes actually found.
        found: [u8; 4],
    },
    /// Format version newer than this build supports.
    #[error("unsupported checkpoint format version {found}, supported up to {supported}")]
    UnsupportedVersion {
        /// Version found.
        found: u32,
        /// Highest version this build supports.
        supported: u32,
    },
    /// CRC32 mismatch: data corruption.
    #[error("checkpoint checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        expected: u32,
        /// Checksum computed from the payload.
        computed: u32,
    },
    /// Declared payload length doesn't match the actual remaining bytes.
    #[error("checkpoint length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Length recorded in the header.
        declared: u64,
        /// Length actually present.
        actual: u64,
    },
}

fn wrap(payload: &[u8]) -> Vec<u8> {
    let checksum = crc32fast::hash(payload);
    let length = payload.len() as u64;
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&checksum.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn unwrap(data: &[u8]) -> std::result::Result<&[u8], IntegrityError> {
    if data.len() < HEADER_SIZE {
        return Err(IntegrityError::FileTooSmall {
            size: data.len(),
            minimum: HEADER_SIZE,
        });
    }
    let magic: [u8; 4] = data[0..4].try_into().expect("slice is 4 bytes");
    if &magic != MAGIC {
        return Err(IntegrityError::InvalidMagic {
            expected: *MAGIC,
            found: magic,
        });
    }
    let version = u32::from_le_bytes(data[4..8].try_into().expect("slice is 4 bytes"));
    if version > FORMAT_VERSION {
        return Err(IntegrityError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let stored_checksum = u32::from_le_bytes(data[8..12].try_into().expect("slice is 4 bytes"));
    let declared_length = u64::from_le_bytes(data[12..20].try_into().expect("slice is 8 bytes"));
    let payload = &data[HEADER_SIZE..];
    let actual_length = payload.len() as u64;
    if declared_length != actual_length {
        return Err(IntegrityError::LengthMismatch {
            declared: declared_length,
            actual: actual_length,
        });
    }
    let computed = crc32fast::hash(payload);
    if computed != stored_checksum {
        return Err(IntegrityError::ChecksumMismatch {
            expected: stored_checksum,
            computed,
        });
    }
    Ok(payload)
}

#[derive(Serialize, Deserialize)]
struct OnDiskRecord {
    step_id: u64,
    state: DeliberationState,
    written_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Checkpoint store backed by one file per `(session_id, step_id)` under a
/// root directory, using a cross-process advisory lock (`fs2`) for the
/// duration of each write so concurrent writers from different processes
/// can't interleave.
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Use `root` as the checkpoint directory, creating it if necessary.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::checkpoint("*", 0, format!("failed to create {root:?}: {e}")))?;
        Ok(Self { root })
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    fn step_path(&self, session_id: &str, step_id: u64) -> PathBuf {
        self.session_dir(session_id).join(format!("{step_id:020}.chk"))
    }

    fn read_record(path: &Path, session_id: &str, step_id: u64) -> Result<Option<OnDiskRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut file = File::open(path)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("open failed: {e}")))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("read failed: {e}")))?;
        let payload = unwrap(&bytes)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("integrity check failed: {e}")))?;
        let record: OnDiskRecord = bincode::deserialize(payload)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("decode failed: {e}")))?;
        Ok(Some(record))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(
        &self,
        session_id: &str,
        step_id: u64,
        state: &DeliberationState,
        ttl_days: u64,
    ) -> Result<()> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("mkdir failed: {e}")))?;
        let now = Utc::now();
        let record = OnDiskRecord {
            step_id,
            state: state.clone(),
            written_at: now,
            expires_at: now + ChronoDuration::days(ttl_days as i64),
        };
        let payload = bincode::serialize(&record)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("encode failed: {e}")))?;
        let wrapped = wrap(&payload);

        let path = self.step_path(session_id, step_id);
        let tmp_path = path.with_extension("chk.tmp");
        let mut file = File::create(&tmp_path)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("create failed: {e}")))?;
        file.lock_exclusive()
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("lock failed: {e}")))?;
        file.write_all(&wrapped)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("write failed: {e}")))?;
        file.sync_all()
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("sync failed: {e}")))?;
        FileExt::unlock(&file)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("unlock failed: {e}")))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| Error::checkpoint(session_id, step_id, format!("rename failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, session_id: &str, step_id: u64) -> Result<Option<CheckpointRecord>> {
        let path = self.step_path(session_id, step_id);
        let record = Self::read_record(&path, session_id, step_id)?;
        let now = Utc::now();
        Ok(record
            .filter(|r| r.expires_at > now)
            .map(|r| CheckpointRecord {
                step_id: r.step_id,
                state: r.state,
                written_at: r.written_at,
                expires_at: r.expires_at,
            }))
    }

    async fn latest(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        let dir = self.session_dir(session_id);
        if !dir.exists() {
            return Ok(None);
        }
        let mut step_ids: Vec<u64> = fs::read_dir(&dir)
            .map_err(|e| Error::checkpoint(session_id, 0, format!("readdir failed: {e}")))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<u64>().ok())
            })
            .collect();
        step_ids.sort_unstable();
        for step_id in step_ids.into_iter().rev() {
            if let Some(record) = self.get(session_id, step_id).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let dir = self.session_dir(session_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| Error::checkpoint(session_id, 0, format!("remove failed: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::sample_state;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let state = sample_state();
        store.put("s1", 0, &state, 7).await.unwrap();
        let record = store.get("s1", 0).await.unwrap().unwrap();
        assert_eq!(record.state.session_id, state.session_id);
    }

    #[tokio::test]
    async fn latest_picks_highest_step_id_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let state = sample_state();
        for step in [0_u64, 1, 2] {
            store.put("s1", step, &state, 7).await.unwrap();
        }
        assert_eq!(store.latest("s1").await.unwrap().unwrap().step_id, 2);
    }

    #[tokio::test]
    async fn corrupted_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let state = sample_state();
        store.put("s1", 0, &state, 7).await.unwrap();

        let path = store.step_path("s1", 0);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = store.get("s1", 0).await.unwrap_err();
        assert!(matches!(err, Error::Checkpoint { .. }));
    }

    #[tokio::test]
    async fn delete_removes_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let state = sample_state();
        store.put("s1", 0, &state, 7).await.unwrap();
        store.delete("s1").await.unwrap();
        assert!(store.latest("s1").await.unwrap().is_none());
    }
}
