use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::file::{BlockFile, DEFAULT_BUFFER_SIZE};
use crate::record::length_prefix;

/// A block buffered writer for raw bytes and length prefixed records.
///
/// The file is created, or truncated if it already exists.
#[derive(Debug)]
pub struct OutputFile {
    file: BlockFile<BufWriter<File>>,
    items: usize,
}

impl OutputFile {
    /// Creates the file with the default buffer size.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Creates the file with a buffer of `buffer_size` bytes.
    pub fn with_buffer_size(path: impl AsRef<Path>, buffer_size: usize) -> io::Result<Self> {
        let file = BlockFile::open(path, buffer_size)?;
        Ok(Self { file, items: 0 })
    }

    /// Writes the bytes as is, this does not count as a record.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.stream_mut()?.write_all(buf)?;
        self.file.advance(buf.len());
        Ok(())
    }

    /// Writes a single byte length prefix followed by the payload.
    ///
    /// # Panics
    ///
    /// If the payload is longer than [crate::MAX_RECORD_LEN] bytes.
    pub fn append_record(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = length_prefix(payload);

        let writer = self.file.stream_mut()?;
        writer.write_all(&[len])?;
        writer.write_all(payload)?;

        self.file.advance(crate::record::encoded_len(payload.len()));
        self.items += 1;
        Ok(())
    }

    /// The number of records written via [OutputFile::append_record].
    pub fn items(&self) -> usize {
        self.items
    }

    /// Flushes the in-memory buffer to disk.
    pub fn flush(&mut self) -> io::Result<()> {
        self.file.stream_mut()?.flush()
    }

    /// The current byte offset within the file.
    pub fn tell(&self) -> u64 {
        self.file.tell()
    }

    /// Flushes and releases the file and its buffer, calling this more than
    /// once is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        self.file.close()
    }

    /// The path the file was opened from.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
