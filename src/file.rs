use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use humansize::BINARY;
use tracing::{debug, warn};

/// The default size of the block buffer attached to every file.
///
/// See https://github.com/coreutils/coreutils/blob/master/src/ioblksize.h,
/// 128KiB is about the minimum block size which keeps the syscall
/// overhead out of the profile. We go a bit further than that.
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// How the underlying file is opened.
pub enum OpenMode {
    /// Open an existing file for reading.
    Read,
    /// Create the file, truncating it if it already exists.
    Write,
}

impl OpenMode {
    fn open(self, path: &Path) -> io::Result<File> {
        match self {
            OpenMode::Read => File::open(path),
            OpenMode::Write => File::create(path),
        }
    }
}

/// A buffered stream which can be owned by a [BlockFile].
///
/// The stream's internal buffer is the block buffer, so the buffer
/// is released together with the file.
pub trait BlockStream: Sized {
    /// The mode the file is opened with for this stream.
    const MODE: OpenMode;

    /// Wraps the opened file with a buffer of `capacity` bytes.
    fn with_capacity(capacity: usize, file: File) -> Self;

    /// Flushes any pending data and releases the stream.
    fn finish(self) -> io::Result<()>;
}

impl BlockStream for BufReader<File> {
    const MODE: OpenMode = OpenMode::Read;

    fn with_capacity(capacity: usize, file: File) -> Self {
        BufReader::with_capacity(capacity, file)
    }

    fn finish(self) -> io::Result<()> {
        Ok(())
    }
}

impl BlockStream for BufWriter<File> {
    const MODE: OpenMode = OpenMode::Write;

    fn with_capacity(capacity: usize, file: File) -> Self {
        BufWriter::with_capacity(capacity, file)
    }

    fn finish(mut self) -> io::Result<()> {
        self.flush()?;
        self.into_inner().map_err(|e| e.into_error())?;
        Ok(())
    }
}

/// A file handle which owns its stream along with a fixed size block buffer.
///
/// The handle is either open or closed, once closed it stays closed and
/// every stream operation returns an error. Handles are move-only, two
/// owners of the same stream would close it twice.
pub struct BlockFile<S: BlockStream> {
    path: PathBuf,
    buffer_size: usize,
    pos: u64,
    stream: Option<S>,
}

impl<S: BlockStream> BlockFile<S> {
    /// Opens the file at the given path with a buffer of `buffer_size` bytes.
    ///
    /// Callers are expected to abort whatever they were doing if this fails,
    /// there is no such thing as a half open handle.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if buffer_size == 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "Block buffer size must be at least one byte.",
            ));
        }

        let file = S::MODE.open(&path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Unable to open {:?} in {:?} mode: {}", path, S::MODE, e),
            )
        })?;

        debug!(
            path = %path.display(),
            mode = ?S::MODE,
            buffer_size = %humansize::format_size(buffer_size, BINARY),
            "Opened file.",
        );

        Ok(Self {
            path,
            buffer_size,
            pos: 0,
            stream: Some(S::with_capacity(buffer_size, file)),
        })
    }

    /// The current byte offset within the file.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Flushes and releases the stream and its buffer.
    ///
    /// Calling this more than once is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => return Ok(()),
        };

        debug!(path = %self.path.display(), pos = self.pos, "Closing file.");
        stream.finish()
    }

    /// Whether `close` has not been called yet.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The capacity of the block buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The mode the file was opened with.
    pub fn mode(&self) -> OpenMode {
        S::MODE
    }

    pub(crate) fn stream_mut(&mut self) -> io::Result<&mut S> {
        self.stream.as_mut().ok_or_else(|| {
            io::Error::new(ErrorKind::Other, "File has already been closed.")
        })
    }

    /// Moves the tracked offset forward after `n` bytes went through the stream.
    pub(crate) fn advance(&mut self, n: usize) {
        self.pos += n as u64;
    }
}

impl<S: BlockStream> Debug for BlockFile<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockFile({:?}, {:?})", self.path, S::MODE)
    }
}

impl<S: BlockStream> Drop for BlockFile<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(
                error = ?e,
                path = %self.path.display(),
                "Failed to flush file while dropping handle.",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, Read};

    use super::*;

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let err = BlockFile::<BufReader<File>>::open(&path, DEFAULT_BUFFER_SIZE)
            .expect_err("Opening a missing file should fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_zero_buffer_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        let err = BlockFile::<BufWriter<File>>::open(&path, 0)
            .expect_err("A zero sized buffer should be rejected");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!path.exists());
    }

    #[test]
    fn test_write_mode_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"old contents").unwrap();

        let mut file = BlockFile::<BufWriter<File>>::open(&path, 16).unwrap();
        assert_eq!(file.mode(), OpenMode::Write);
        file.stream_mut().unwrap().write_all(b"new").unwrap();
        file.advance(3);
        file.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        let mut file = BlockFile::<BufWriter<File>>::open(&path, 64).unwrap();
        file.stream_mut().unwrap().write_all(b"hello").unwrap();
        assert!(file.is_open());

        file.close().unwrap();
        assert!(!file.is_open());
        file.close().unwrap();
        drop(file);

        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_drop_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        {
            let mut file =
                BlockFile::<BufWriter<File>>::open(&path, DEFAULT_BUFFER_SIZE).unwrap();
            file.stream_mut().unwrap().write_all(b"buffered").unwrap();
            assert_eq!(std::fs::read(&path).unwrap(), b"");
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"buffered");
    }

    #[test]
    fn test_closed_stream_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, b"abc").unwrap();

        let mut file = BlockFile::<BufReader<File>>::open(&path, 8).unwrap();
        let mut buf = String::new();
        file.stream_mut().unwrap().read_line(&mut buf).unwrap();
        assert_eq!(buf, "abc");

        file.close().unwrap();
        let err = file.stream_mut().expect_err("Stream should be gone");
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_tell_tracks_advance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut file = BlockFile::<BufReader<File>>::open(&path, 4).unwrap();
        assert_eq!(file.tell(), 0);

        let mut buf = [0; 6];
        file.stream_mut().unwrap().read_exact(&mut buf).unwrap();
        file.advance(buf.len());
        assert_eq!(file.tell(), 6);
        assert_eq!(file.buffer_size(), 4);
        assert_eq!(file.path(), path.as_path());
    }
}
