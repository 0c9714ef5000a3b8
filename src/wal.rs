//! Write-ahead log: a length-prefixed, checksummed record stream that makes
//! memtable writes durable before they land in memory.
//!
//! ```text
//! record: crc32(4 LE) | type=KV(4 LE) | len(4 LE) | payload(len)
//! ```
//!
//! The payload for a `KV` record is itself `internal_key_len(4 LE) ||
//! internal_key || value`. The source this was ported from treats the WAL
//! payload as an opaque blob — `WAL::AddRecord(string_view)` never inspects
//! it — and leaves the inverse `DecodeKVPair` unimplemented, so splitting an
//! internal key's variable-length user-key prefix back out of a flat
//! `internal_key || value` concatenation has no well-defined answer without
//! an explicit length somewhere. This module supplies the missing length
//! prefix; [`crate::memtable`] is the only caller that needs to know about
//! it.
//!
//! This crate's only CRC dependency is `crc32fast`, which implements the
//! CRC-32/ISO-HDLC polynomial rather than Castagnoli (CRC-32C). Both serve
//! the same purpose here — detecting a torn or bit-flipped record before it
//! reaches the memtable — so this module uses `crc32fast` under the
//! `crc32c` name the wire format borrows from the source.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::file::{SequentialReader, WritableFile};

/// Size of a WAL record's fixed header: crc32(4) + type(4) + len(4).
const RECORD_HEADER_LEN: usize = 12;

/// The only record type defined today.
const RECORD_TYPE_KV: u32 = 0;

fn crc32c(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Encodes a memtable record's WAL payload: `internal_key_len(4 LE) ||
/// internal_key || value`.
pub fn encode_kv_payload(internal_key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + internal_key.len() + value.len());
    out.extend_from_slice(&(internal_key.len() as u32).to_le_bytes());
    out.extend_from_slice(internal_key);
    out.extend_from_slice(value);
    out
}

/// Splits a `KV` record's payload back into `(internal_key, value)`.
pub fn decode_kv_payload(payload: &[u8]) -> Result<(&[u8], &[u8])> {
    if payload.len() < 4 {
        return Err(Error::BadRecord(
            "WAL payload shorter than its internal-key length prefix".into(),
        ));
    }
    let key_len = u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize;
    let rest = &payload[4..];
    if key_len > rest.len() {
        return Err(Error::BadRecord(format!(
            "WAL payload claims a {key_len}-byte internal key but only {} bytes remain",
            rest.len()
        )));
    }
    Ok((&rest[..key_len], &rest[key_len..]))
}

/// Appends `KV` records to a WAL generation's file.
pub struct WalWriter {
    file: WritableFile,
}

impl WalWriter {
    /// Creates a new, empty WAL generation at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: WritableFile::create(path)?,
        })
    }

    /// Appends one `KV` record carrying `payload` (see [`encode_kv_payload`]).
    pub fn add_record(&mut self, payload: &[u8]) -> Result<()> {
        let crc = crc32c(payload);
        let mut header = [0u8; RECORD_HEADER_LEN];
        header[0..4].copy_from_slice(&crc.to_le_bytes());
        header[4..8].copy_from_slice(&RECORD_TYPE_KV.to_le_bytes());
        header[8..12].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        self.file.append(&header)?;
        self.file.append(payload)?;
        Ok(())
    }

    /// Flushes the user-space buffer without forcing an OS-level sync.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    /// Flushes, then forces the OS to persist written records.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    /// Flushes and releases the file handle. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Syncs, closes, and unlinks this WAL generation. Once a memtable's
    /// flush is durably published there is nothing left to recover from
    /// this file.
    pub fn close_and_unlink(mut self) -> Result<()> {
        self.file.sync()?;
        self.file.close()?;
        fs::remove_file(self.file.path())?;
        Ok(())
    }
}

/// The outcome of one [`WalReader::read_record`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A well-formed record, with its payload.
    Record(Vec<u8>),
    /// Clean end of file: either no more bytes, or a header/payload that was
    /// cut short mid-write (a crash between writing the header and the
    /// payload, or between starting and finishing the payload, looks
    /// identical to a clean end from the reader's point of view).
    Eof,
}

/// Reads `KV` records back out of a WAL file, in order.
pub struct WalReader {
    file: SequentialReader,
    path: PathBuf,
}

impl WalReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Ok(Self {
            file: SequentialReader::open(&path)?,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next record.
    ///
    /// A truncated header or truncated payload both surface as
    /// [`ReadOutcome::Eof`] — on recovery, a torn final write is
    /// indistinguishable from having reached the end of a clean log, and
    /// both terminate replay the same way. A flipped bit inside a complete
    /// record instead fails with [`Error::ChecksumMismatch`]; an unrecognized
    /// record type fails with [`Error::BadRecord`].
    pub fn read_record(&mut self) -> Result<ReadOutcome> {
        let header = self.file.read(RECORD_HEADER_LEN)?;
        if header.len() < RECORD_HEADER_LEN {
            return Ok(ReadOutcome::Eof);
        }
        let crc = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let record_type = u32::from_le_bytes(header[4..8].try_into().unwrap());
        if record_type != RECORD_TYPE_KV {
            return Err(Error::BadRecord(format!(
                "unrecognized WAL record type {record_type}"
            )));
        }
        let len = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;

        let payload = self.file.read(len)?;
        if payload.len() < len {
            return Ok(ReadOutcome::Eof);
        }
        if crc32c(&payload) != crc {
            return Err(Error::ChecksumMismatch);
        }
        Ok(ReadOutcome::Record(payload))
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}
