//! Buffered, sequential, and memory-mapped file primitives the SSTable and
//! WAL layers are built on, plus the database directory layout.
//!
//! Every durable artifact is published the same way: write to a temp file
//! under the target directory, fsync, then rename to its canonical path.
//! [`TempFile`] produces the writable handle; callers own finishing the
//! rename once they know the final name (an SSTable's name depends on the
//! digest of what was written, so it can't be chosen up front).

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};

/// In-process buffer size for [`WritableFile`], matching the source's 64 KiB
/// default.
const WRITABLE_FILE_BUFFER_SIZE: usize = 1 << 16;

/// Buffered, append-only sequential writer.
pub struct WritableFile {
    path: PathBuf,
    inner: Option<BufWriter<File>>,
}

impl WritableFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            inner: Some(BufWriter::with_capacity(WRITABLE_FILE_BUFFER_SIZE, file)),
        })
    }

    pub fn append_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            inner: Some(BufWriter::with_capacity(WRITABLE_FILE_BUFFER_SIZE, file)),
        })
    }

    fn inner_mut(&mut self) -> Result<&mut BufWriter<File>> {
        self.inner.as_mut().ok_or(Error::DbClosed)
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.inner_mut()?.write_all(data)?;
        Ok(())
    }

    /// Flushes the user-space buffer without forcing an OS-level sync.
    pub fn flush(&mut self) -> Result<()> {
        self.inner_mut()?.flush()?;
        Ok(())
    }

    /// Flushes, then forces the OS to persist the written data.
    pub fn sync(&mut self) -> Result<()> {
        let w = self.inner_mut()?;
        w.flush()?;
        w.get_ref().sync_data()?;
        Ok(())
    }

    /// Flushes and releases the file handle. Idempotent: closing twice is a
    /// no-op on the second call.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut w) = self.inner.take() {
            w.flush()?;
        }
        Ok(())
    }

    pub fn rename(&mut self, new_path: impl AsRef<Path>) -> Result<()> {
        self.close()?;
        fs::rename(&self.path, new_path.as_ref())?;
        self.path = new_path.as_ref().to_path_buf();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WritableFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Forward-only reader over a file.
pub struct SequentialReader {
    path: PathBuf,
    inner: Option<File>,
}

impl SequentialReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            inner: Some(file),
        })
    }

    fn inner_mut(&mut self) -> Result<&mut File> {
        self.inner.as_mut().ok_or(Error::DbClosed)
    }

    /// Reads up to `len` bytes, returning fewer at end of file.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let file = self.inner_mut()?;
        let mut total = 0;
        loop {
            if total == len {
                break;
            }
            let n = file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        Ok(buf)
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.inner_mut()?.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.inner = None;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A writable file created under a temporary name within the target
/// directory, so that a later rename to the canonical name is an atomic
/// same-filesystem operation.
pub struct TempFile {
    file: WritableFile,
}

impl TempFile {
    /// Creates `<dir>/.tmp-<pid>-<counter>.<suffix>` and opens it for
    /// buffered writing.
    pub fn open(dir: impl AsRef<Path>, suffix: &str) -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!(".tmp-{}-{unique:016x}.{suffix}", std::process::id());
        let path = dir.join(name);
        let file = WritableFile::create(&path)?;
        Ok(Self { file })
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.append(data)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Syncs, then atomically renames this file to `final_path`, its
    /// canonical name.
    pub fn publish(mut self, final_path: impl AsRef<Path>) -> Result<()> {
        self.file.sync()?;
        self.file.rename(final_path)?;
        Ok(())
    }
}

/// A whole-file, read-only memory map.
pub struct MmapReader {
    path: PathBuf,
    mmap: Mmap,
}

impl MmapReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(Error::Mmap)?;
        Ok(Self { path, mmap })
    }

    pub fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the `len` bytes starting at `offset`. Fails with
    /// [`Error::OutOfRange`] if the requested span runs past the end of the
    /// file.
    pub fn read(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let size = self.size();
        let end = offset
            .checked_add(len)
            .ok_or(Error::OutOfRange { offset, len, size })?;
        if end > size {
            return Err(Error::OutOfRange { offset, len, size });
        }
        Ok(&self.mmap[offset as usize..end as usize])
    }
}

/// A positioned reader over a file, independent of any shared cursor.
pub struct RandomAccessReader {
    file: File,
}

impl RandomAccessReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    #[cfg(unix)]
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        use std::os::unix::fs::FileExt;
        let mut buf = vec![0u8; len];
        self.file.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    #[cfg(not(unix))]
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        use std::io::Read;
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// --- database directory layout -------------------------------------------

pub fn current_file(dbname: impl AsRef<Path>) -> PathBuf {
    dbname.as_ref().join("CURRENT")
}

pub fn sst_dir(dbname: impl AsRef<Path>) -> PathBuf {
    dbname.as_ref().join("sst")
}

pub fn sst_file(sst_dir: impl AsRef<Path>, sha256_hex: &str) -> PathBuf {
    sst_dir.as_ref().join(format!("{sha256_hex}.sst"))
}

pub fn wal_dir(dbname: impl AsRef<Path>) -> PathBuf {
    dbname.as_ref().join("wal")
}

pub fn wal_file(wal_dir: impl AsRef<Path>, log_number: u64) -> PathBuf {
    wal_dir.as_ref().join(format!("{log_number}.wal"))
}

/// Parses the log number out of a WAL filename produced by [`wal_file`].
pub fn parse_wal_file(filename: &str) -> Result<u64> {
    let stem = filename.strip_suffix(".wal").ok_or_else(|| {
        Error::InvalidArgument(format!("not a WAL filename: {filename}"))
    })?;
    stem.parse::<u64>()
        .map_err(|_| Error::InvalidArgument(format!("not a WAL filename: {filename}")))
}
