//! # Persistence Collaborator
//!
//! **Read integer or default; write integer synchronously.**
//!
//! The ledger only needs a tiny key-value contract, captured by
//! [`KeyValueStore`]. Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: process-local map, for tests and throwaway sessions.
//! - [`JournalStore`]: append-only journal file. Every write is fsynced
//!   before `write_int` returns, and the file is replayed on open. A failed
//!   append is cut back off the file, so a write reported as failed is never
//!   replayed later.
//!
//! ## Journal format
//!
//! ```text
//! [4 bytes: magic "MJNL"]
//! [4 bytes: version]
//! [8 bytes: LSN at last checkpoint]
//!
//! Record format:
//! [8 bytes: LSN (Log Sequence Number)]
//! [1 byte: record type (PUT)]
//! [4 bytes: payload length]
//! [N bytes: payload (key length u16, key bytes, value i64)]
//! [4 bytes: CRC32 of above]
//! ```
//!
//! A torn or corrupt tail (crash mid-write) ends replay; the file is
//! truncated back to the last intact record so later appends stay readable.

use crate::error::{GachaError, GachaResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"MJNL";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

/// Header size in bytes.
const HEADER_LEN: u64 = 16;

/// Fixed bytes around a payload: LSN + type + length + CRC.
const RECORD_OVERHEAD: u64 = 8 + 1 + 4 + 4;

/// Largest payload a PUT can produce: key length, key, value.
const MAX_PAYLOAD_LEN: usize = 2 + u16::MAX as usize + 8;

/// Records past which `open` compacts the journal.
pub const COMPACT_THRESHOLD: u64 = 64;

/// Key-value contract used by the ledger.
pub trait KeyValueStore: Send + Sync {
    /// Reads an integer, `None` when the key was never written.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::Storage`] if the backend cannot be read.
    fn read_int(&self, key: &str) -> GachaResult<Option<i64>>;

    /// Writes an integer. Durable once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::Storage`] if the write could not be persisted.
    fn write_int(&self, key: &str, value: i64) -> GachaResult<()>;

    /// Reads an integer or falls back to `default`.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn read_int_or(&self, key: &str, default: i64) -> GachaResult<i64> {
        Ok(self.read_int(key)?.unwrap_or(default))
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, i64>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read_int(&self, key: &str) -> GachaResult<Option<i64>> {
        Ok(self.values.read().get(key).copied())
    }

    fn write_int(&self, key: &str, value: i64) -> GachaResult<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Journal record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    /// Set a key to a value.
    Put = 1,
}

impl RecordType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Put),
            _ => None,
        }
    }
}

fn encode_put(key: &str, value: i64) -> GachaResult<Vec<u8>> {
    let key_len = u16::try_from(key.len())
        .map_err(|_| GachaError::Storage(format!("key too long: {} bytes", key.len())))?;
    let mut buf = Vec::with_capacity(2 + key.len() + 8);
    buf.extend_from_slice(&key_len.to_le_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
    Ok(buf)
}

fn decode_put(data: &[u8]) -> Option<(String, i64)> {
    let key_len = usize::from(u16::from_le_bytes(data.get(0..2)?.try_into().ok()?));
    let key = std::str::from_utf8(data.get(2..2 + key_len)?).ok()?.to_string();
    let value = i64::from_le_bytes(data.get(2 + key_len..2 + key_len + 8)?.try_into().ok()?);
    Some((key, value))
}

fn record_bytes(lsn: u64, record_type: RecordType, payload: &[u8]) -> GachaResult<Vec<u8>> {
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| GachaError::Storage("journal payload too large".to_string()))?;
    let mut buf = Vec::with_capacity(payload.len() + 17);
    buf.extend_from_slice(&lsn.to_le_bytes());
    buf.push(record_type as u8);
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

fn header_bytes(lsn: u64) -> [u8; 16] {
    let mut header = [0u8; 16];
    header[0..4].copy_from_slice(JOURNAL_MAGIC);
    header[4..8].copy_from_slice(&JOURNAL_VERSION.to_le_bytes());
    header[8..16].copy_from_slice(&lsn.to_le_bytes());
    header
}

fn io_err(context: &str) -> impl FnOnce(std::io::Error) -> GachaError + '_ {
    move |e| GachaError::Storage(format!("{context}: {e}"))
}

/// Result of replaying a journal file.
struct Replay {
    values: HashMap<String, i64>,
    next_lsn: u64,
    /// Offset just past the last intact record.
    valid_len: u64,
    /// Intact records found after the header.
    records: u64,
}

/// Append handle plus the bookkeeping needed to undo a failed append.
struct JournalFile {
    file: File,
    /// Length of the file up to the last durable record.
    len: u64,
    /// Records since the last checkpoint.
    records: u64,
}

impl JournalFile {
    /// Writes and syncs one record. On failure the caller must `rollback`.
    fn append(&mut self, record: &[u8]) -> GachaResult<()> {
        self.file
            .write_all(record)
            .map_err(io_err("journal write failed"))?;
        self.file.sync_data().map_err(io_err("journal sync failed"))?;
        self.len += record.len() as u64;
        self.records += 1;
        Ok(())
    }

    /// Cuts the file back to the last durable record, dropping a partial or
    /// unsynced append so disk and memory agree.
    fn rollback(&mut self) {
        if let Err(err) = self.file.set_len(self.len) {
            tracing::error!(error = %err, len = self.len, "failed to roll back journal append");
        }
    }
}

/// Append-only, CRC-checked journal file.
pub struct JournalStore {
    path: PathBuf,
    /// Next Log Sequence Number.
    current_lsn: AtomicU64,
    /// Append handle (protected by mutex for writes).
    journal: Mutex<JournalFile>,
    /// Replayed state.
    values: RwLock<HashMap<String, i64>>,
}

impl JournalStore {
    /// Opens or creates a journal, replaying any existing records.
    ///
    /// A journal holding more than [`COMPACT_THRESHOLD`] records is compacted
    /// right after replay, so the file stays bounded across sessions.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::Storage`] if the file cannot be opened, has a
    /// foreign magic number, or an unsupported version.
    pub fn open(path: impl AsRef<Path>) -> GachaResult<Self> {
        let path = path.as_ref().to_path_buf();

        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if is_new {
            let mut file = File::create(&path).map_err(io_err("failed to create journal"))?;
            file.write_all(&header_bytes(0))
                .map_err(io_err("failed to write journal header"))?;
            file.sync_all().map_err(io_err("failed to sync journal header"))?;
        }

        let replay = Self::replay(&path)?;

        let file = OpenOptions::new()
            .write(true)
            .append(true)
            .open(&path)
            .map_err(io_err("failed to open journal for append"))?;

        let on_disk = file.metadata().map_err(io_err("failed to stat journal"))?.len();
        if on_disk > replay.valid_len {
            tracing::warn!(
                path = %path.display(),
                discarded = on_disk - replay.valid_len,
                "journal has a torn tail, truncating"
            );
            file.set_len(replay.valid_len)
                .map_err(io_err("failed to truncate journal"))?;
        }

        tracing::debug!(
            path = %path.display(),
            keys = replay.values.len(),
            records = replay.records,
            "journal replayed"
        );

        let store = Self {
            path,
            current_lsn: AtomicU64::new(replay.next_lsn),
            journal: Mutex::new(JournalFile {
                file,
                len: replay.valid_len,
                records: replay.records,
            }),
            values: RwLock::new(replay.values),
        };

        if replay.records > COMPACT_THRESHOLD {
            store.checkpoint()?;
        }
        Ok(store)
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written since the last checkpoint.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.journal.lock().records
    }

    fn replay(path: &Path) -> GachaResult<Replay> {
        let file = File::open(path).map_err(io_err("failed to open journal for replay"))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; 16];
        reader
            .read_exact(&mut header)
            .map_err(io_err("failed to read journal header"))?;
        if &header[0..4] != JOURNAL_MAGIC {
            return Err(GachaError::Storage("invalid journal magic".to_string()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != JOURNAL_VERSION {
            return Err(GachaError::Storage(format!("unsupported journal version: {version}")));
        }
        let mut checkpoint_lsn = [0u8; 8];
        checkpoint_lsn.copy_from_slice(&header[8..16]);

        let mut values = HashMap::new();
        let mut next_lsn = u64::from_le_bytes(checkpoint_lsn);
        let mut valid_len = HEADER_LEN;
        let mut records = 0;

        // End of file or corruption stops replay.
        while let Some((lsn, record_type, payload)) = Self::read_record(&mut reader) {
            match record_type {
                RecordType::Put => {
                    let Some((key, value)) = decode_put(&payload) else {
                        break;
                    };
                    values.insert(key, value);
                }
            }
            next_lsn = next_lsn.max(lsn + 1);
            valid_len += RECORD_OVERHEAD + payload.len() as u64;
            records += 1;
        }

        Ok(Replay {
            values,
            next_lsn,
            valid_len,
            records,
        })
    }

    fn read_record(reader: &mut BufReader<File>) -> Option<(u64, RecordType, Vec<u8>)> {
        let mut head = [0u8; 13];
        reader.read_exact(&mut head).ok()?;
        let lsn = u64::from_le_bytes(head[0..8].try_into().ok()?);
        let record_type = RecordType::from_u8(head[8])?;
        let payload_len = u32::from_le_bytes(head[9..13].try_into().ok()?) as usize;

        // An unverified length is never trusted with an allocation.
        if payload_len > MAX_PAYLOAD_LEN {
            return None;
        }

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload).ok()?;

        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes).ok()?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&head);
        hasher.update(&payload);
        if hasher.finalize() != u32::from_le_bytes(crc_bytes) {
            return None;
        }

        Some((lsn, record_type, payload))
    }

    /// Rewrites the journal with one record per live key.
    ///
    /// The compacted file is written beside the journal and renamed over it,
    /// so a crash leaves either the old or the new file intact.
    ///
    /// # Errors
    ///
    /// Returns [`GachaError::Storage`] on any IO failure.
    pub fn checkpoint(&self) -> GachaResult<()> {
        let mut journal = self.journal.lock();
        let values = self.values.read();

        let checkpoint_lsn = self.current_lsn.load(Ordering::SeqCst);
        let tmp_path = self.path.with_extension("compact");
        let mut len = HEADER_LEN;
        let mut lsn = checkpoint_lsn;
        {
            let mut tmp = BufWriter::new(
                File::create(&tmp_path).map_err(io_err("failed to create compacted journal"))?,
            );
            tmp.write_all(&header_bytes(checkpoint_lsn))
                .map_err(io_err("compaction write failed"))?;
            for (key, value) in values.iter() {
                let record = record_bytes(lsn, RecordType::Put, &encode_put(key, *value)?)?;
                tmp.write_all(&record).map_err(io_err("compaction write failed"))?;
                len += record.len() as u64;
                lsn += 1;
            }
            tmp.flush().map_err(io_err("compaction flush failed"))?;
            tmp.get_ref().sync_all().map_err(io_err("compaction sync failed"))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(io_err("failed to replace journal"))?;

        let reopened = OpenOptions::new()
            .write(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err("failed to reopen journal"))?;
        let before = journal.records;
        *journal = JournalFile {
            file: reopened,
            len,
            records: values.len() as u64,
        };
        self.current_lsn.store(lsn, Ordering::SeqCst);

        tracing::debug!(
            path = %self.path.display(),
            keys = values.len(),
            dropped = before.saturating_sub(journal.records),
            "journal compacted"
        );
        Ok(())
    }
}

impl KeyValueStore for JournalStore {
    fn read_int(&self, key: &str) -> GachaResult<Option<i64>> {
        Ok(self.values.read().get(key).copied())
    }

    fn write_int(&self, key: &str, value: i64) -> GachaResult<()> {
        let payload = encode_put(key, value)?;

        let mut journal = self.journal.lock();
        let lsn = self.current_lsn.load(Ordering::SeqCst);
        let record = record_bytes(lsn, RecordType::Put, &payload)?;

        if let Err(err) = journal.append(&record) {
            journal.rollback();
            return Err(err);
        }

        self.current_lsn.store(lsn + 1, Ordering::SeqCst);
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

impl std::fmt::Debug for JournalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalStore")
            .field("path", &self.path)
            .field("lsn", &self.current_lsn.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
