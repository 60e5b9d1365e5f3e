use std::alloc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use cap::Cap;
use humansize::DECIMAL;
use topk_fileio::{
    InputFile,
    OutputFile,
    RecordFile,
    DEFAULT_BUFFER_SIZE,
    MAX_RECORD_LEN,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

struct Args {
    input: PathBuf,
    output: PathBuf,
    buffer_size: usize,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let (input, output) = match (args.next(), args.next()) {
            (Some(input), Some(output)) => (PathBuf::from(input), PathBuf::from(output)),
            _ => bail!("Usage: topk-records <input.txt> <output.rec> [buffer-size-bytes]"),
        };

        let buffer_size = match args.next() {
            Some(size) => size
                .parse()
                .with_context(|| format!("Invalid buffer size {:?}", size))?,
            None => DEFAULT_BUFFER_SIZE,
        };

        Ok(Self {
            input,
            output,
            buffer_size,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse()?;

    info!(input = %args.input.display(), output = %args.output.display(), "Converting lines");
    let start = Instant::now();
    let (items, skipped) = convert(&args)?;
    let elapsed = start.elapsed();

    let records = verify(&args.output, items)?;

    println!(
        "wrote {} records ({} skipped) in {}, {}, {} allocated.",
        items,
        skipped,
        humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)),
        humansize::format_size(records.as_bytes().len(), DECIMAL),
        humansize::format_size(ALLOCATOR.allocated(), DECIMAL),
    );

    Ok(())
}

/// Reads the written records back, checking the file holds exactly `items` of them.
fn verify(path: &Path, items: usize) -> anyhow::Result<RecordFile> {
    let records = RecordFile::open(path)
        .with_context(|| format!("Failed to open {:?} for verification", path))?;
    let counted = records.count_records()?;
    if counted != items {
        bail!("Wrote {} records but read back {}", items, counted);
    }
    Ok(records)
}

/// Copies every line of the input into a record of the output.
///
/// Returns the number of records written and lines skipped.
fn convert(args: &Args) -> anyhow::Result<(usize, usize)> {
    let mut reader = InputFile::with_buffer_size(&args.input, args.buffer_size)
        .with_context(|| format!("Failed to open input {:?}", args.input))?;
    let mut writer = OutputFile::with_buffer_size(&args.output, args.buffer_size)
        .with_context(|| format!("Failed to create output {:?}", args.output))?;

    let mut line = Vec::new();
    let mut skipped = 0;
    while reader.read_line_bytes(&mut line)? {
        if line.len() > MAX_RECORD_LEN {
            warn!(
                path = %reader.path().display(),
                offset = reader.tell(),
                len = line.len(),
                "Skipping line which is too long for a record.",
            );
            skipped += 1;
            continue;
        }

        writer.append_record(&line)?;

        if writer.items() % 1_000_000 == 0 {
            info!("Completed: {}/unknown", writer.items());
        }
    }

    reader.close()?;
    writer.close()?;

    Ok((writer.items(), skipped))
}
