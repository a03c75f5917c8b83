// Container header sniffing and normalization.
//
// A container starts with a 12-byte header. Byte 0 is the version tag and
// selects the width of every block-length prefix that follows. The other
// 11 bytes are opaque and passed through to the decoded output.

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Size of the container header, copied verbatim into the decoded output.
pub const HEADER_LEN: usize = 12;

/// Version tag written to byte 0 of every decoded header.
pub const CANONICAL_TAG: u8 = 0x01;

/// Standard containers: 4-byte block-length prefixes.
pub const TAG_STANDARD: u8 = 0x04;

/// Legacy-extended containers: 8-byte block-length prefixes.
pub const TAG_LEGACY_EXTENDED: u8 = 0x07;

/// Encrypted containers. Recognized but never decoded.
pub const TAG_ENCRYPTED: u8 = 0x08;

// ---------------------------------------------------------------------------
// Format version
// ---------------------------------------------------------------------------

/// Decodable container versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    Standard,
    LegacyExtended,
}

impl FormatVersion {
    /// Map a version tag to a decodable version.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            TAG_STANDARD => Ok(Self::Standard),
            TAG_LEGACY_EXTENDED => Ok(Self::LegacyExtended),
            TAG_ENCRYPTED => Err(Error::EncryptedFormat),
            other => Err(Error::UnsupportedFormat(other)),
        }
    }

    /// Width in bytes of each block-length prefix.
    pub const fn length_field_width(self) -> usize {
        match self {
            Self::Standard => 4,
            Self::LegacyExtended => 8,
        }
    }

    pub const fn tag(self) -> u8 {
        match self {
            Self::Standard => TAG_STANDARD,
            Self::LegacyExtended => TAG_LEGACY_EXTENDED,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::LegacyExtended => "legacy-extended",
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: FormatVersion,
    /// Header bytes exactly as they appear in the input.
    pub raw: [u8; HEADER_LEN],
}

impl ContainerHeader {
    /// Validate the leading header of `input`.
    ///
    /// Fails with `TruncatedInput` when fewer than 12 bytes are available,
    /// `EncryptedFormat` for tag 0x08 and `UnsupportedFormat` for any tag
    /// other than 0x04 and 0x07.
    pub fn sniff(input: &[u8]) -> Result<Self> {
        let raw: [u8; HEADER_LEN] = input
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(Error::TruncatedInput {
                offset: 0,
                needed: HEADER_LEN,
                limit: input.len(),
            })?;
        let version = FormatVersion::from_tag(raw[0])?;
        Ok(Self { version, raw })
    }

    /// Header bytes as they appear at the start of the decoded output:
    /// the version tag is replaced by `CANONICAL_TAG`.
    pub fn normalized(&self) -> [u8; HEADER_LEN] {
        let mut out = self.raw;
        out[0] = CANONICAL_TAG;
        out
    }
}
