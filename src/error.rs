//! Crate-wide error type.
//!
//! Every fallible operation in `strata` returns [`Result<T>`], an alias over
//! [`std::result::Result`] with [`Error`] as the failure type. Variants are
//! grouped by the subsystem that raises them but unified into one enum so a
//! caller walking up through several layers (e.g. an SSTable reader calling
//! into the footer and filter blocks) doesn't need per-layer wrapping.
//!
//! The two logical, expected outcomes named alongside this enum in the spec
//! — "key not found" and "end of file" — are not variants here. A missing
//! key is a normal `Ok(None)` from [`crate::memtable::Memtable::get`] and
//! [`crate::sstable::SstableReader::get`], and WAL end-of-file is
//! [`crate::wal::ReadOutcome::Eof`], a value a caller matches on directly
//! rather than unwrapping out of an `Err`. Neither needs an `Error` variant
//! of its own.

use std::io;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the storage core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Underlying I/O failure (open, read, write, rename, stat, mkstemp).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Memory-mapping a file failed.
    #[error("mmap error: {0}")]
    Mmap(io::Error),

    /// A block, footer, or filter buffer did not match the expected layout.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The footer block failed to parse (wrong size or bad magic).
    #[error("footer block error: {0}")]
    FooterBlock(String),

    /// The filter block failed to parse.
    #[error("filter block error: {0}")]
    FilterBlock(String),

    /// A positioned read ran past the end of its source.
    #[error("out of range: offset {offset} + len {len} > size {size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    /// A WAL record's header or payload was malformed.
    #[error("bad record: {0}")]
    BadRecord(String),

    /// A WAL record's CRC did not match its payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A caller-supplied argument violated a documented precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The memtable's WAL has already been dropped; no further writes are
    /// accepted.
    #[error("database closed")]
    DbClosed,

    /// An internal lock was poisoned by a panicking holder.
    #[error("internal error: {0}")]
    Internal(String),
}
