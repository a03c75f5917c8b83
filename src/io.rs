// Output sink.
//
// Two ways to persist a payload:
//   - `write_artifact()` writes one standalone file through a sibling
//     staging file that is renamed into place once its length is verified.
//     A failed write leaves any previous artifact untouched.
//   - `DumpSink` appends every payload of a run to one file, opened lazily,
//     with no framing between payloads. A failed append is cut back off the
//     stream. An empty dump file is removed when the run finishes.
//
// With the `file-io` feature a SHA-256 of every written payload is computed
// while it streams to disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::error::{Error, Result};

/// File name of the run-wide dump stream.
pub const DUMP_FILE_NAME: &str = "importer-dump.scne";

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Suffix of the staging file an artifact is written to before the rename.
const STAGING_SUFFIX: &str = ".part";

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Result of persisting one payload.
#[derive(Debug, Clone)]
pub struct WriteStats {
    /// File the bytes went to.
    pub path: PathBuf,
    /// Number of bytes written by this call.
    pub bytes: u64,
    /// SHA-256 of the bytes written (if `file-io` feature is enabled).
    pub sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Standalone files
// ---------------------------------------------------------------------------

/// Staging path for `path`: `.<file name>.part` in the same directory.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{STAGING_SUFFIX}"))
}

/// Write `payload` to `path`, replacing any existing file.
///
/// Nothing at `path` changes unless the whole payload reached the disk.
pub fn write_artifact(path: &Path, payload: &[u8]) -> Result<WriteStats> {
    let staging = staging_path(path);
    let result = write_staged(&staging, path, payload);
    if result.is_err()
        && staging.exists()
        && let Err(e) = fs::remove_file(&staging)
    {
        warn!("cannot remove staging file {}: {e}", staging.display());
    }
    result
}

fn write_staged(staging: &Path, path: &Path, payload: &[u8]) -> Result<WriteStats> {
    let file = File::create(staging)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
    let sha256 = write_hashed(&mut writer, payload)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;

    let expected = payload.len() as u64;
    let written = file.metadata()?.len();
    drop(file);
    if written != expected {
        return Err(Error::ShortWrite {
            path: path.to_path_buf(),
            expected,
            written,
        });
    }

    fs::rename(staging, path)?;
    info!("wrote {} ({} bytes)", path.display(), written);
    Ok(WriteStats {
        path: path.to_path_buf(),
        bytes: written,
        sha256,
    })
}

// ---------------------------------------------------------------------------
// Dump stream
// ---------------------------------------------------------------------------

/// Storage behind a dump stream.
pub trait DumpTarget: Write + Sized {
    /// Open `path` for writing, discarding previous content.
    fn create(path: &Path) -> io::Result<Self>;

    /// Cut the stream back to its first `len` bytes and continue writing
    /// from there.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl DumpTarget for File {
    fn create(path: &Path) -> io::Result<Self> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

/// Run-wide append-only aggregate of decoded payloads.
///
/// The stream only ever holds whole payloads: an append that fails partway
/// is truncated away. If that truncation fails too, the sink is poisoned and
/// refuses further appends, and `finish()` reports an error.
#[derive(Debug)]
pub struct DumpSink<T: DumpTarget = File> {
    path: PathBuf,
    target: Option<T>,
    written: u64,
    poisoned: bool,
}

impl DumpSink {
    /// Prepare a dump stream at `path`. Nothing is created until the first
    /// `append()`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            target: None,
            written: 0,
            poisoned: false,
        }
    }

    /// Dump stream named `DUMP_FILE_NAME` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DUMP_FILE_NAME))
    }
}

impl<T: DumpTarget> DumpSink<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes of whole payloads appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append `payload` as-is after everything written before it.
    pub fn append(&mut self, payload: &[u8]) -> Result<WriteStats> {
        if self.poisoned {
            return Err(self.poisoned_error());
        }
        let target = match self.target.take() {
            Some(t) => t,
            None => {
                debug!("opening dump stream {}", self.path.display());
                T::create(&self.path)?
            }
        };
        let target = self.target.insert(target);

        let sha256 = match write_hashed(target, payload) {
            Ok(digest) => digest,
            Err(e) => {
                if let Err(cut) = target.truncate_to(self.written) {
                    warn!(
                        "cannot cut failed append off {}: {cut}",
                        self.path.display()
                    );
                    self.poisoned = true;
                }
                return Err(e.into());
            }
        };
        self.written += payload.len() as u64;
        Ok(WriteStats {
            path: self.path.clone(),
            bytes: payload.len() as u64,
            sha256,
        })
    }

    /// Flush and close the stream.
    ///
    /// Returns the dump path if it holds data. A stream that was opened but
    /// received zero bytes is deleted.
    pub fn finish(mut self) -> Result<Option<PathBuf>> {
        if self.poisoned {
            return Err(self.poisoned_error());
        }
        let Some(mut target) = self.target.take() else {
            return Ok(None);
        };
        target.flush()?;
        drop(target);

        if self.written == 0 {
            debug!("removing empty dump stream {}", self.path.display());
            fs::remove_file(&self.path)?;
            return Ok(None);
        }
        info!(
            "dump stream {} holds {} bytes",
            self.path.display(),
            self.written
        );
        Ok(Some(self.path))
    }

    fn poisoned_error(&self) -> Error {
        Error::Io(io::Error::other(format!(
            "dump stream {} holds a partial payload",
            self.path.display()
        )))
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn write_hashed<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<Option<[u8; 32]>> {
    let mut hasher = sha2::Sha256::new();
    let mut hashing_writer = HashingWriter {
        inner: writer,
        hasher: &mut hasher,
    };
    hashing_writer.write_all(payload)?;
    hashing_writer.flush()?;
    Ok(Some(hasher.finalize().into()))
}

#[cfg(not(feature = "file-io"))]
fn write_hashed<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<Option<[u8; 32]>> {
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(None)
}

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Lowercase hex rendering of a digest.
pub fn hex_digest(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
