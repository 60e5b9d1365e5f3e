use std::io;
use std::io::ErrorKind;
use std::mem::size_of;

/// The length prefix of every record.
type RecordLen = u8;

/// The size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = size_of::<RecordLen>();

/// The largest payload a single record can carry.
///
/// `255` is never written as a length, downstream readers rely on that.
pub const MAX_RECORD_LEN: usize = RecordLen::MAX as usize - 1;

#[inline]
/// Produces the length prefix for the given payload.
///
/// # Panics
///
/// If the payload is longer than [MAX_RECORD_LEN], a record that large
/// cannot be represented and the caller has a bug.
pub fn length_prefix(payload: &[u8]) -> RecordLen {
    assert!(
        payload.len() <= MAX_RECORD_LEN,
        "Record payload of {} bytes exceeds the maximum of {} bytes.",
        payload.len(),
        MAX_RECORD_LEN,
    );
    payload.len() as RecordLen
}

#[inline]
/// The number of bytes a record with a payload of `payload_len` takes up on disk.
pub fn encoded_len(payload_len: usize) -> usize {
    LENGTH_PREFIX_SIZE + payload_len
}

/// Appends a single framed record to the buffer.
///
/// This has the same size restrictions as [length_prefix].
pub fn encode_record_to(buffer: &mut Vec<u8>, payload: &[u8]) {
    let len = length_prefix(payload);
    buffer.reserve(encoded_len(payload.len()));
    buffer.push(len);
    buffer.extend_from_slice(payload);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Truncated record at offset {offset}, expected {expected} bytes but only {available} remain"
)]
/// A record file ended part way through a record.
pub struct Corrupted {
    /// The offset of the record's length prefix.
    pub offset: usize,
    /// The payload length declared by the prefix.
    pub expected: usize,
    /// The number of payload bytes actually left in the file.
    pub available: usize,
}

impl From<Corrupted> for io::Error {
    fn from(value: Corrupted) -> Self {
        io::Error::new(ErrorKind::InvalidData, value)
    }
}
