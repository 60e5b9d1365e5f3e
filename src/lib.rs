mod file;
mod input;
mod output;
mod reader;
pub mod record;

pub use file::{BlockFile, BlockStream, OpenMode, DEFAULT_BUFFER_SIZE};
pub use input::{InputFile, Lines, LINE_BUFFER_SIZE};
pub use output::OutputFile;
pub use reader::{RecordFile, RecordReader};
pub use record::{Corrupted, MAX_RECORD_LEN};
