// Asset paths.
//
// Turns user-supplied path text (command-line arguments, lines typed or
// dropped into the interactive prompt) into a checked `AssetDescriptor`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Length of the extensions batch traversal picks up (`bmap`, `bmsh`, ...).
pub const ASSET_EXTENSION_LEN: usize = 4;

/// Quote characters terminals wrap around dragged-and-dropped paths.
const QUOTES: &[char] = &['\'', '"'];

/// Everything known about one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub path: PathBuf,
    /// Directory containing the file (`.` for bare file names).
    pub root: PathBuf,
    pub file_name: String,
    pub stem: String,
    /// Extension without the leading dot; empty when there is none.
    pub extension: String,
    /// Size of the compressed file in bytes.
    pub raw_size: u64,
    /// Decoded size in bytes, including the normalized header.
    pub inflated_size: u64,
}

impl AssetDescriptor {
    /// Describe `path` without touching the filesystem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let root = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        Self {
            file_name: lossy(path.file_name()),
            stem: lossy(path.file_stem()),
            extension: lossy(path.extension()),
            root,
            path,
            raw_size: 0,
            inflated_size: 0,
        }
    }

    /// Sanitize `raw` and check that it names an existing file.
    pub fn resolve(raw: &str) -> Result<Self> {
        let path = sanitize_path(raw);
        let meta = fs::metadata(&path).map_err(|_| Error::PathNotFound(path.clone()))?;
        let mut asset = Self::from_path(path);
        asset.raw_size = meta.len();
        Ok(asset)
    }
}

/// Clean up path text typed or pasted by a user.
///
/// Trims whitespace and surrounding quotes and normalizes `\` separators to
/// `/`. Nothing else about the path is changed.
pub fn sanitize_path(raw: &str) -> PathBuf {
    let trimmed = raw
        .trim()
        .trim_start_matches(QUOTES)
        .trim_end_matches(QUOTES)
        .trim();
    PathBuf::from(trimmed.replace('\\', "/"))
}

/// Whether batch traversal should pick up `path`.
pub fn has_asset_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.chars().count() == ASSET_EXTENSION_LEN)
}

/// Regular files directly inside `dir` with an asset extension, sorted by
/// name. Subdirectories are not descended into.
pub fn list_assets(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if has_asset_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
