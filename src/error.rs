// Crate-wide error type.
//
// Every failure is terminal for the file being processed and non-fatal for
// the run. `ErrorKind` is the coarse classification written to the error log.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout bagunpack.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("short write to {}: expected {expected} bytes, wrote {written}", path.display())]
    ShortWrite {
        path: PathBuf,
        expected: u64,
        written: u64,
    },

    #[error("out of buffer: {required} bytes needed, arena capacity is {capacity}")]
    OutOfBuffer { required: usize, capacity: usize },

    #[error("match offset {offset} reaches before the start of the output ({position} bytes written)")]
    InvalidMatchOffset { offset: usize, position: usize },

    #[error("encrypted container (version tag 0x08)")]
    EncryptedFormat,

    #[error("unsupported container version tag 0x{0:02x}")]
    UnsupportedFormat(u8),

    #[error("DDS signature not found in {inflated} decoded bytes")]
    MissingSignature { inflated: usize },

    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("truncated input: {needed} bytes needed at offset {offset}, limit is {limit}")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        limit: usize,
    },
}

/// Coarse error classification, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    OutOfBuffer,
    EncryptedFormat,
    InvalidFormat,
    PathNotFound,
    UnsupportedFormat,
    TruncatedInput,
}

impl ErrorKind {
    /// Numeric code printed in error log lines.
    pub const fn code(self) -> i32 {
        match self {
            Self::Io => -1,
            Self::OutOfBuffer => -2,
            Self::EncryptedFormat => -3,
            Self::InvalidFormat => -4,
            Self::PathNotFound => -5,
            Self::UnsupportedFormat => -6,
            Self::TruncatedInput => -7,
        }
    }

    /// Short human-readable reason.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Io => "can't read file",
            Self::OutOfBuffer => "out of buffer",
            Self::EncryptedFormat => "encrypted data",
            Self::InvalidFormat => "invalid data",
            Self::PathNotFound => "path does not exist",
            Self::UnsupportedFormat => "unsupported format",
            Self::TruncatedInput => "truncated data",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::ShortWrite { .. } => ErrorKind::Io,
            Self::OutOfBuffer { .. } | Self::InvalidMatchOffset { .. } => ErrorKind::OutOfBuffer,
            Self::EncryptedFormat => ErrorKind::EncryptedFormat,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::MissingSignature { .. } => ErrorKind::InvalidFormat,
            Self::PathNotFound(_) => ErrorKind::PathNotFound,
            Self::TruncatedInput { .. } => ErrorKind::TruncatedInput,
        }
    }
}
