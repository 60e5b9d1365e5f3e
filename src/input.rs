use std::cmp;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use memchr::memchr;

use crate::file::{BlockFile, DEFAULT_BUFFER_SIZE};

/// The size of the scratch space a single `read_line` call works with.
///
/// At most `LINE_BUFFER_SIZE - 1` bytes come back from one call, anything
/// left of the line is returned by the next call.
pub const LINE_BUFFER_SIZE: usize = 1024;

/// A block buffered reader for newline delimited text files.
#[derive(Debug)]
pub struct InputFile {
    file: BlockFile<BufReader<File>>,
}

impl InputFile {
    /// Opens the file for reading with the default buffer size.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Opens the file for reading with a buffer of `buffer_size` bytes.
    pub fn with_buffer_size(path: impl AsRef<Path>, buffer_size: usize) -> io::Result<Self> {
        let file = BlockFile::open(path, buffer_size)?;
        Ok(Self { file })
    }

    /// Reads the next line into `output` with the trailing newline removed.
    ///
    /// Returns `false` once the end of the file is reached, in which case
    /// `output` is left untouched.
    ///
    /// Lines which are not valid UTF-8 return an `InvalidData` error, use
    /// [InputFile::read_line_bytes] for arbitrary content.
    ///
    /// NUL bytes are kept, the line does not end at the first `\0` the way
    /// a C string read with `fgets` would.
    pub fn read_line(&mut self, output: &mut String) -> io::Result<bool> {
        let mut line = Vec::new();
        if !self.read_line_bytes(&mut line)? {
            return Ok(false);
        }

        *output = String::from_utf8(line)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        Ok(true)
    }

    /// Reads the next line as raw bytes into `output` with the trailing
    /// newline removed.
    ///
    /// Returns `false` once the end of the file is reached, in which case
    /// `output` is left untouched.
    pub fn read_line_bytes(&mut self, output: &mut Vec<u8>) -> io::Result<bool> {
        let mut line = Vec::new();
        let res = fill_line(self.file.stream_mut()?, &mut line);

        // Consumed bytes count towards the offset even if the read failed.
        self.file.advance(line.len());
        res?;

        if line.is_empty() {
            return Ok(false);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        }

        *output = line;
        Ok(true)
    }

    /// An iterator over the remaining lines of the file.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { file: self }
    }

    /// The current byte offset within the file.
    pub fn tell(&self) -> u64 {
        self.file.tell()
    }

    /// Releases the file and its buffer, calling this more than once is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        self.file.close()
    }

    /// The path the file was opened from.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Reads up to the next newline, or `LINE_BUFFER_SIZE - 1` bytes, into `line`.
///
/// Every byte consumed from the stream ends up in `line`, including when an
/// error is returned part way through.
fn fill_line<R: BufRead>(stream: &mut R, line: &mut Vec<u8>) -> io::Result<()> {
    let limit = LINE_BUFFER_SIZE - 1;

    while line.len() < limit {
        let available = match stream.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if available.is_empty() {
            break;
        }

        let wanted = cmp::min(available.len(), limit - line.len());
        let (used, found_newline) = match memchr(b'\n', &available[..wanted]) {
            Some(pos) => (pos + 1, true),
            None => (wanted, false),
        };

        line.extend_from_slice(&available[..used]);
        stream.consume(used);

        if found_newline {
            break;
        }
    }

    Ok(())
}

/// Iterator returned by [InputFile::lines].
pub struct Lines<'a> {
    file: &'a mut InputFile,
}

impl<'a> Iterator for Lines<'a> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.file.read_line(&mut line) {
            Ok(true) => Some(Ok(line)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
