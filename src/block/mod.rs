//! Data / index block writer and reader.
//!
//! A block is a sequence of variable-length key/value records grouped into
//! fixed-entry "restart" runs. Every [`RESTART_INTERVAL`]-th record stores its
//! key in full; the records between restarts store only the suffix that
//! differs from the previous key in the run, prefixed by a `shared_len`. This
//! is the same prefix-compression scheme LevelDB-family stores use, applied
//! here to internal keys.
//!
//! ```text
//! record:  shared_len(4 LE) | unshared_len(4 LE) | value_len(4 LE) | key_suffix | value
//! trailer: restart_offset_0(4) .. restart_offset_{r-1}(4) | restart_count(4)
//! ```
//!
//! Within a block, internal keys are strictly ascending — [`BlockWriter::add`]
//! enforces this on every call, not just across restarts.

mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub use reader::{BlockIterator, BlockReader};
pub use writer::BlockWriter;

/// Number of records between successive restart points.
pub const RESTART_INTERVAL: usize = 16;

/// Size in bytes of one encoded block-record header field (`shared_len`,
/// `unshared_len`, or `value_len`).
const FIELD_LEN: usize = 4;

/// Size in bytes of a block record's fixed header (three `u32` fields).
const RECORD_HEADER_LEN: usize = FIELD_LEN * 3;

/// `(offset, size)` locating a block within its file. Both fields are
/// 32-bit: SSTables in this format are bounded to 4 GiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u32,
    pub size: u32,
}

impl BlockHandle {
    pub const ENCODED_LEN: usize = 8;

    pub fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.offset.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub fn decode(src: &[u8]) -> crate::error::Result<Self> {
        if src.len() < Self::ENCODED_LEN {
            return Err(crate::error::Error::UnsupportedFormat(format!(
                "block handle needs {} bytes, got {}",
                Self::ENCODED_LEN,
                src.len()
            )));
        }
        let offset = u32::from_le_bytes(src[0..4].try_into().unwrap());
        let size = u32::from_le_bytes(src[4..8].try_into().unwrap());
        Ok(Self { offset, size })
    }
}
