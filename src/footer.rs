//! The fixed 18-byte trailer every SSTable file ends with.
//!
//! ```text
//! meta_block_handle(8) | index_block_handle(8) | 0x12 | 0x34
//! ```

use crate::block::BlockHandle;
use crate::error::{Error, Result};

/// Size in bytes of an encoded footer.
pub const FOOTER_SIZE: usize = BlockHandle::ENCODED_LEN * 2 + 2;

const MAGIC: [u8; 2] = [0x12, 0x34];

/// Builds the footer from the two handles an SSTable writer produces last.
#[derive(Debug, Default)]
pub struct FooterBlockWriter {
    meta_handle: Option<BlockHandle>,
    index_handle: Option<BlockHandle>,
}

impl FooterBlockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, meta_handle: BlockHandle, index_handle: BlockHandle) {
        self.meta_handle = Some(meta_handle);
        self.index_handle = Some(index_handle);
    }

    /// Encodes the footer. Fails if [`add`](Self::add) was never called.
    pub fn finalize(&self) -> Result<[u8; FOOTER_SIZE]> {
        let meta = self
            .meta_handle
            .ok_or_else(|| Error::FooterBlock("meta block handle not set".into()))?;
        let index = self
            .index_handle
            .ok_or_else(|| Error::FooterBlock("index block handle not set".into()))?;

        let mut out = [0u8; FOOTER_SIZE];
        out[0..8].copy_from_slice(&meta.encode());
        out[8..16].copy_from_slice(&index.encode());
        out[16..18].copy_from_slice(&MAGIC);
        Ok(out)
    }
}

/// Parses a footer read from the last [`FOOTER_SIZE`] bytes of an SSTable.
#[derive(Debug, Clone, Copy)]
pub struct FooterBlockReader {
    meta_handle: BlockHandle,
    index_handle: BlockHandle,
}

impl FooterBlockReader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FOOTER_SIZE {
            return Err(Error::FooterBlock(format!(
                "footer must be {FOOTER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[16..18] != MAGIC {
            return Err(Error::FooterBlock("bad magic number".into()));
        }
        let meta_handle = BlockHandle::decode(&bytes[0..8])?;
        let index_handle = BlockHandle::decode(&bytes[8..16])?;
        Ok(Self {
            meta_handle,
            index_handle,
        })
    }

    pub fn meta_handle(&self) -> BlockHandle {
        self.meta_handle
    }

    pub fn index_handle(&self) -> BlockHandle {
        self.index_handle
    }
}

#[cfg(test)]
mod tests;
