use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use keeper_types::{ActorId, Credential, Sequence};

use crate::error::{StoreError, StoreResult};

/// One durable mutation of the store.
///
/// Payloads are kept in their canonical JSON encoding so the bytes read back
/// are exactly the bytes appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    /// A whole submission batch. One record, so a crash cannot split it.
    Appended {
        source: ActorId,
        events: Vec<(Sequence, Vec<u8>)>,
    },
    Status {
        sequence: Sequence,
        status: u8,
    },
    ActorCreated {
        actor: ActorId,
        credential: Option<Credential>,
    },
    CredentialBound {
        actor: ActorId,
        credential: Credential,
    },
    PairingIssued {
        key: String,
        actor: ActorId,
    },
    PairingRedeemed {
        key: String,
    },
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// The file under a [`RecordLog`]: appended to, and cut back on failure.
pub trait LogFile: Write + Send {
    /// Drop everything past `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Append-only file of length- and CRC-framed records.
///
/// On-disk format, repeated:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogRecord)]
/// ```
///
/// Only the tail may be incomplete (a write torn by a crash); it is cut off
/// on open. A complete frame that fails its CRC is corruption and refuses to
/// open, since skipping it would silently rewrite history.
///
/// A frame whose write or sync fails is cut off again before the error is
/// returned, so a failed append never reappears on reopen. If even that cut
/// fails the log is poisoned and refuses further writes.
pub struct RecordLog<F: LogFile = File> {
    path: PathBuf,
    file: F,
    offset: u64,
    sync_every_write: bool,
    poisoned: bool,
}

impl RecordLog<File> {
    /// Open (or create) the log and return every record it holds.
    pub fn open(path: &Path, sync_every_write: bool) -> StoreResult<(Self, Vec<LogRecord>)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        let (records, valid_len) = decode_frames(&bytes)?;
        if valid_len < bytes.len() as u64 {
            warn!(
                path = %path.display(),
                valid_len,
                file_len = bytes.len(),
                "torn record at log tail; truncating"
            );
            file.set_len(valid_len)?;
        }

        debug!(path = %path.display(), recovered = records.len(), "record log opened");

        Ok((
            Self::from_file(path.to_path_buf(), file, valid_len, sync_every_write),
            records,
        ))
    }
}

impl<F: LogFile> RecordLog<F> {
    fn from_file(path: PathBuf, file: F, offset: u64, sync_every_write: bool) -> Self {
        Self {
            path,
            file,
            offset,
            sync_every_write,
            poisoned: false,
        }
    }

    /// Append one record. Returns the byte offset it was written at.
    pub fn append(&mut self, record: &LogRecord) -> StoreResult<u64> {
        if self.poisoned {
            return Err(StoreError::LogPoisoned(self.path.clone()));
        }

        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("record larger than 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let entry_offset = self.offset;
        if let Err(err) = self.write_frame(&frame) {
            self.roll_back();
            return Err(err.into());
        }
        self.offset += frame.len() as u64;

        debug!(offset = entry_offset, len = payload.len(), "record appended");
        Ok(entry_offset)
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        if self.sync_every_write {
            self.file.sync()?;
        }
        Ok(())
    }

    /// Cut the file back to the last complete record.
    fn roll_back(&mut self) {
        match self.file.truncate(self.offset) {
            Ok(()) => warn!(
                path = %self.path.display(),
                offset = self.offset,
                "failed append rolled back"
            ),
            Err(err) => {
                error!(path = %self.path.display(), %err, "rollback failed; log poisoned");
                self.poisoned = true;
            }
        }
    }

    /// Current end of the log in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Decode frames front to back. Returns the records and the length of the
/// valid prefix.
fn decode_frames(bytes: &[u8]) -> StoreResult<(Vec<LogRecord>, u64)> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= bytes.len() {
        let header = &bytes[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + HEADER_SIZE;
        let end = start + length;
        if length == 0 || end > bytes.len() {
            break;
        }

        let payload = &bytes[start..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            return Err(StoreError::CorruptRecord {
                offset: offset as u64,
                reason: format!("CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
            });
        }

        let record: LogRecord =
            bincode::deserialize(payload).map_err(|e| StoreError::CorruptRecord {
                offset: offset as u64,
                reason: e.to_string(),
            })?;
        records.push(record);
        offset = end;
    }

    Ok((records, offset as u64))
}
