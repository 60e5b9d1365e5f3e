use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::record::{Corrupted, LENGTH_PREFIX_SIZE};

/// A memory mapped record file, as produced by [crate::OutputFile::append_record].
pub struct RecordFile {
    path: PathBuf,
    // Empty files cannot be mapped.
    data: Option<Mmap>,
}

impl RecordFile {
    /// Maps the file at the given path.
    ///
    /// The file must not be modified while it is open.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        let data = if file.metadata()?.len() == 0 {
            None
        } else {
            // SAFETY:
            // Record files are written once and only read afterwards.
            Some(unsafe { Mmap::map(&file)? })
        };

        debug!(
            path = %path.display(),
            len = data.as_ref().map(|m| m.len()).unwrap_or(0),
            "Mapped record file.",
        );

        Ok(Self { path, data })
    }

    /// The raw contents of the file.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// A reader over the records of the file.
    pub fn reader(&self) -> RecordReader<'_> {
        RecordReader::from_bytes(self.as_bytes())
    }

    /// Validates every record in the file, returning how many there are.
    pub fn count_records(&self) -> Result<usize, Corrupted> {
        let mut reader = self.reader();
        let mut count = 0;
        while reader.next_record()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// The path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Debug for RecordFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordFile({:?})", self.path)
    }
}

/// Reads length prefixed records out of a buffer.
pub struct RecordReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RecordReader<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// The offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reads the next record.
    ///
    /// Returns `None` once all records have been read, a record which runs
    /// past the end of the buffer is [Corrupted]. After an error the reader
    /// stays where it was.
    pub fn next_record(&mut self) -> Result<Option<&'a [u8]>, Corrupted> {
        let data = self.data;
        let remaining = &data[self.offset..];
        let (len, rest) = match remaining.split_first() {
            Some((len, rest)) => (*len as usize, rest),
            None => return Ok(None),
        };

        if rest.len() < len {
            return Err(Corrupted {
                offset: self.offset,
                expected: len,
                available: rest.len(),
            });
        }

        self.offset += LENGTH_PREFIX_SIZE + len;
        Ok(Some(&rest[..len]))
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<&'a [u8], Corrupted>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                // Nothing past a truncated record can be trusted.
                self.offset = self.data.len();
                Some(Err(e))
            },
        }
    }
}
