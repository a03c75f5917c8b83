// Payload extraction.
//
// Decides which part of a decoded container is persisted and under which
// name. Map assets carry a DDS texture somewhere after the container's own
// preamble; everything else is written whole.

use std::path::{Path, PathBuf};

use crate::asset::AssetDescriptor;
use crate::error::{Error, Result};

/// Marker at the start of an embedded DDS texture: `"DDS "` plus the first
/// byte of the header size field (124).
pub const DDS_SIGNATURE: [u8; 5] = [b'D', b'D', b'S', 0x20, 0x7C];

/// Extension given to extracted textures.
pub const DDS_EXTENSION: &str = "dds";

/// Extension of map assets, compared case-insensitively.
pub const DEFAULT_MAP_EXTENSION: &str = "bmap";

/// Where an extracted payload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Appended to the run-wide dump stream.
    Dump,
    /// Written to its own file.
    File(PathBuf),
}

/// The byte range of the decoded output to persist.
#[derive(Debug)]
pub struct Extraction<'a> {
    pub payload: &'a [u8],
    /// Offset of `payload` inside the decoded output.
    pub offset: usize,
    pub destination: Destination,
}

/// Locate `signature` with a single forward pass.
///
/// The partial-match counter drops back to zero on any mismatching byte and
/// that byte is not retried as a new first byte.
pub fn find_signature(haystack: &[u8], signature: &[u8]) -> Option<usize> {
    if signature.is_empty() {
        return Some(0);
    }
    let mut matched = 0usize;
    for (i, &byte) in haystack.iter().enumerate() {
        if byte == signature[matched] {
            matched += 1;
            if matched == signature.len() {
                return Some(i + 1 - signature.len());
            }
        } else {
            matched = 0;
        }
    }
    None
}

/// Rules for turning a decoded container into an output artifact.
#[derive(Debug, Clone)]
pub struct Extractor {
    /// Append everything to the dump stream instead of extracting.
    pub dump: bool,
    /// Extensions (without the dot) treated as map assets.
    pub map_extensions: Vec<String>,
    /// Directory for extracted files; `None` writes next to the source.
    pub out_dir: Option<PathBuf>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            dump: false,
            map_extensions: vec![DEFAULT_MAP_EXTENSION.to_string()],
            out_dir: None,
        }
    }
}

impl Extractor {
    pub fn is_map(&self, asset: &AssetDescriptor) -> bool {
        self.map_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&asset.extension))
    }

    /// Select the payload of `decoded` (the full inflated output of `asset`).
    pub fn extract<'a>(
        &self,
        asset: &AssetDescriptor,
        decoded: &'a [u8],
    ) -> Result<Extraction<'a>> {
        if self.dump {
            return Ok(Extraction {
                payload: decoded,
                offset: 0,
                destination: Destination::Dump,
            });
        }

        if self.is_map(asset) {
            let offset = find_signature(decoded, &DDS_SIGNATURE).ok_or(Error::MissingSignature {
                inflated: decoded.len(),
            })?;
            return Ok(Extraction {
                payload: &decoded[offset..],
                offset,
                destination: Destination::File(self.output_path(asset, &dds_file_name(asset))),
            });
        }

        Ok(Extraction {
            payload: decoded,
            offset: 0,
            destination: Destination::File(self.output_path(asset, &raw_file_name(asset))),
        })
    }

    fn output_path(&self, asset: &AssetDescriptor, file_name: &str) -> PathBuf {
        let dir: &Path = self.out_dir.as_deref().unwrap_or(&asset.root);
        dir.join(file_name)
    }
}

/// `<stem>.dds`
pub fn dds_file_name(asset: &AssetDescriptor) -> String {
    format!("{}.{DDS_EXTENSION}", asset.stem)
}

/// `<stem>.raw.<ext>`, or `<stem>.raw` for extensionless sources.
pub fn raw_file_name(asset: &AssetDescriptor) -> String {
    if asset.extension.is_empty() {
        format!("{}.raw", asset.stem)
    } else {
        format!("{}.raw.{}", asset.stem, asset.extension)
    }
}
