// Unpack engine: carries one file at a time through the full pipeline.
//
//   PathValidated -> Loaded -> FormatDetected -> BlockDecoded -> Extracted -> Written
//
// Any stage may fail; the failure is returned to the caller and the next
// file starts from a clean state. The input and output arenas are owned by
// the `Unpacker` and reused for every file of a run.

use std::fmt;
use std::path::PathBuf;

use log::{debug, info};

use crate::asset::AssetDescriptor;
use crate::container::{self, Arena, ContainerHeader, DEFAULT_CAPACITY, FormatVersion};
use crate::error::Result;
use crate::extract::{DEFAULT_MAP_EXTENSION, Destination, Extractor};
use crate::io::{self, DumpSink, WriteStats};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for an unpack run.
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Capacity of each arena; caps both the compressed and decoded size of
    /// a single file.
    pub capacity: usize,
    /// Append every decoded container to one dump file instead of extracting.
    pub dump: bool,
    /// Directory for artifacts and the dump file. `None` puts artifacts next
    /// to their source and the dump file in the working directory.
    pub out_dir: Option<PathBuf>,
    /// Extensions treated as map assets (DDS extraction).
    pub map_extensions: Vec<String>,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            dump: false,
            out_dir: None,
            map_extensions: vec![DEFAULT_MAP_EXTENSION.to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Pipeline stages of a single file, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    PathValidated,
    Loaded,
    FormatDetected,
    BlockDecoded,
    Extracted,
    Written,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PathValidated => "path validated",
            Self::Loaded => "loaded",
            Self::FormatDetected => "format detected",
            Self::BlockDecoded => "blocks decoded",
            Self::Extracted => "extracted",
            Self::Written => "written",
        };
        f.write_str(name)
    }
}

/// Outcome of a successfully unpacked file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub asset: AssetDescriptor,
    pub version: FormatVersion,
    /// Offset of the persisted payload inside the decoded output.
    pub payload_offset: usize,
    /// True when the payload went to the dump stream.
    pub dumped: bool,
    pub output: WriteStats,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Compressed bytes read by successful files.
    pub bytes_read: u64,
    /// Decoded bytes produced by successful files.
    pub bytes_inflated: u64,
    /// Bytes persisted by successful files.
    pub bytes_written: u64,
    /// The dump file, if dump mode produced one.
    pub dump_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Unpacker
// ---------------------------------------------------------------------------

pub struct Unpacker {
    extractor: Extractor,
    input: Arena,
    output: Arena,
    dump_dir: PathBuf,
    dump: Option<DumpSink>,
    summary: RunSummary,
}

impl Unpacker {
    pub fn new(opts: UnpackOptions) -> Self {
        let dump_dir = opts.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        Self {
            extractor: Extractor {
                dump: opts.dump,
                map_extensions: opts.map_extensions,
                out_dir: opts.out_dir,
            },
            input: Arena::new(opts.capacity),
            output: Arena::new(opts.capacity),
            dump_dir,
            dump: None,
            summary: RunSummary::default(),
        }
    }

    /// Resolve user-supplied path text and unpack it.
    pub fn unpack_path(&mut self, raw: &str) -> Result<FileReport> {
        let result = AssetDescriptor::resolve(raw).and_then(|asset| self.run_pipeline(asset));
        self.record(&result);
        result
    }

    /// Unpack an already resolved asset.
    pub fn unpack_asset(&mut self, asset: AssetDescriptor) -> Result<FileReport> {
        let result = self.run_pipeline(asset);
        self.record(&result);
        result
    }

    /// Decoded bytes of the most recent file (header included).
    pub fn decoded(&self) -> &[u8] {
        self.output.as_slice()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Close the dump stream (removing it if empty) and return the totals.
    pub fn finish(mut self) -> Result<RunSummary> {
        if let Some(dump) = self.dump.take() {
            self.summary.dump_file = dump.finish()?;
        }
        Ok(self.summary)
    }

    fn record(&mut self, result: &Result<FileReport>) {
        self.summary.processed += 1;
        match result {
            Ok(report) => {
                self.summary.succeeded += 1;
                self.summary.bytes_read += report.asset.raw_size;
                self.summary.bytes_inflated += report.asset.inflated_size;
                self.summary.bytes_written += report.output.bytes;
            }
            Err(_) => self.summary.failed += 1,
        }
    }

    fn run_pipeline(&mut self, mut asset: AssetDescriptor) -> Result<FileReport> {
        let mut stage = Stage::PathValidated;
        debug!("{}: {stage}", asset.file_name);

        let result = self.advance(&mut asset, &mut stage);
        if let Err(e) = &result {
            debug!("{}: failed after {stage}: {e}", asset.file_name);
        }
        result
    }

    fn advance(&mut self, asset: &mut AssetDescriptor, stage: &mut Stage) -> Result<FileReport> {
        let name = asset.file_name.clone();
        let mut enter = |next: Stage| {
            *stage = next;
            debug!("{name}: {next}");
        };

        asset.raw_size = self.input.load_file(&asset.path)? as u64;
        enter(Stage::Loaded);

        let header = ContainerHeader::sniff(self.input.as_slice())?;
        enter(Stage::FormatDetected);

        container::decode_with_header(self.input.as_slice(), &header, &mut self.output)?;
        asset.inflated_size = self.output.len() as u64;
        enter(Stage::BlockDecoded);

        let extraction = self.extractor.extract(asset, self.output.as_slice())?;
        enter(Stage::Extracted);

        let (output, dumped) = match &extraction.destination {
            Destination::Dump => {
                let dump_dir = &self.dump_dir;
                let sink = self.dump.get_or_insert_with(|| DumpSink::in_dir(dump_dir));
                (sink.append(extraction.payload)?, true)
            }
            Destination::File(path) => (io::write_artifact(path, extraction.payload)?, false),
        };
        enter(Stage::Written);

        info!(
            "{}: {} container, {} -> {} bytes, {} bytes persisted",
            asset.file_name,
            header.version.name(),
            asset.raw_size,
            asset.inflated_size,
            output.bytes
        );

        Ok(FileReport {
            asset: asset.clone(),
            version: header.version,
            payload_offset: extraction.offset,
            dumped,
            output,
        })
    }
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::new(UnpackOptions::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
