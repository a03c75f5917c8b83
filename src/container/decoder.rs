// Block decoder: the LZ77 engine.
//
// After the 12-byte header, a container is a sequence of blocks. Each block
// is a little-endian length prefix (4 or 8 bytes, see `FormatVersion`)
// followed by that many bytes of tokens. A token is:
//
//   token byte      high nibble = literal length, low nibble = match length - 4
//   [ext bytes]     present when the literal nibble is 15
//   literals        copied verbatim
//   offset (u16 LE) absent on the last token of a block
//   [ext bytes]     present when the match nibble is 15
//
// Extension bytes are summed until one is below 255. Matches copy from
// already-decoded output, which includes the normalized header.
//
// Every read is checked against both the input length and the current
// block's declared end; every write is checked against the arena capacity.

use log::{debug, trace};

use super::arena::Arena;
use super::header::{ContainerHeader, FormatVersion, HEADER_LEN};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Token constants
// ---------------------------------------------------------------------------

/// Nibble value announcing extension bytes.
pub const RUN_MASK: usize = 0x0F;

/// Smallest encodable match.
pub const MIN_MATCH: usize = 4;

/// Extension bytes continue while they equal this value.
const EXT_CONTINUE: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Block table
// ---------------------------------------------------------------------------

/// Position of one block inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the length prefix.
    pub offset: usize,
    /// Declared token stream length, excluding the prefix.
    pub declared_len: usize,
}

// ---------------------------------------------------------------------------
// BlockDecoder
// ---------------------------------------------------------------------------

/// Cursor over the block stream of one container.
pub struct BlockDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    width: usize,
}

impl<'a> BlockDecoder<'a> {
    /// Start decoding blocks right after the header.
    pub fn new(input: &'a [u8], version: FormatVersion) -> Self {
        Self {
            input,
            pos: HEADER_LEN.min(input.len()),
            width: version.length_field_width(),
        }
    }

    /// Current read offset into the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read the next length prefix.
    ///
    /// Returns `None` once the whole input is consumed.
    pub fn next_block(&mut self) -> Result<Option<BlockInfo>> {
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        let offset = self.pos;
        let field = self.take(self.width, self.input.len())?;
        let declared = field
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

        let declared_len = usize::try_from(declared).ok();
        match declared_len.and_then(|len| self.pos.checked_add(len).map(|end| (len, end))) {
            Some((declared_len, end)) if end <= self.input.len() => Ok(Some(BlockInfo {
                offset,
                declared_len,
            })),
            _ => Err(Error::TruncatedInput {
                offset: self.pos,
                needed: declared_len.unwrap_or(usize::MAX),
                limit: self.input.len(),
            }),
        }
    }

    /// Decode the tokens of the block whose prefix was just read, appending
    /// to `output`. Returns the number of bytes produced.
    pub fn decode_block(&mut self, block: BlockInfo, output: &mut Arena) -> Result<usize> {
        let block_end = block.offset + self.width + block.declared_len;
        let start_len = output.len();

        while self.pos < block_end {
            let token = self.read_u8(block_end)?;
            let mut literal_len = usize::from(token >> 4);
            let mut match_len = usize::from(token & 0x0F) + MIN_MATCH;

            if literal_len == RUN_MASK {
                literal_len = literal_len.saturating_add(self.read_extension(block_end)?);
            }

            output.ensure_room(literal_len)?;
            let literals = self.take(literal_len, block_end)?;
            output.extend(literals)?;

            if self.pos == block_end {
                break;
            }

            let offset = usize::from(self.read_u16_le(block_end)?);

            if match_len == RUN_MASK + MIN_MATCH {
                match_len = match_len.saturating_add(self.read_extension(block_end)?);
            }

            output.copy_match(offset, match_len)?;
        }

        let produced = output.len() - start_len;
        trace!(
            "block @{}: {} bytes in, {} bytes out",
            block.offset, block.declared_len, produced
        );
        Ok(produced)
    }

    // -----------------------------------------------------------------------
    // Bounded reads
    // -----------------------------------------------------------------------

    fn take(&mut self, len: usize, limit: usize) -> Result<&'a [u8]> {
        let limit = limit.min(self.input.len());
        match self.pos.checked_add(len) {
            Some(end) if end <= limit => {
                let bytes = &self.input[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            _ => Err(Error::TruncatedInput {
                offset: self.pos,
                needed: len,
                limit,
            }),
        }
    }

    fn read_u8(&mut self, limit: usize) -> Result<u8> {
        Ok(self.take(1, limit)?[0])
    }

    fn read_u16_le(&mut self, limit: usize) -> Result<u16> {
        let b = self.take(2, limit)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_extension(&mut self, limit: usize) -> Result<usize> {
        let mut total = 0usize;
        loop {
            let byte = self.read_u8(limit)?;
            total = total.saturating_add(usize::from(byte));
            if byte != EXT_CONTINUE {
                return Ok(total);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Whole-container operations
// ---------------------------------------------------------------------------

/// Decode a whole container into `output`.
///
/// The arena is reset first. On success it holds the normalized header
/// followed by every decoded block, and `output.len()` is the inflated
/// length. On failure its contents are unspecified.
pub fn decode(input: &[u8], output: &mut Arena) -> Result<ContainerHeader> {
    let header = ContainerHeader::sniff(input)?;
    decode_with_header(input, &header, output)?;
    Ok(header)
}

/// Decode a container whose header was already sniffed from `input`.
pub fn decode_with_header(
    input: &[u8],
    header: &ContainerHeader,
    output: &mut Arena,
) -> Result<()> {
    output.reset();
    output.extend(&header.normalized())?;

    let mut decoder = BlockDecoder::new(input, header.version);
    let mut blocks = 0usize;
    while let Some(block) = decoder.next_block()? {
        decoder.decode_block(block, output)?;
        blocks += 1;
    }

    debug!(
        "decoded {} container: {} blocks, {} -> {} bytes",
        header.version.name(),
        blocks,
        input.len(),
        output.len()
    );
    Ok(())
}

/// Decode a container into a fresh buffer.
///
/// Convenience wrapper around `decode` for one-off, in-memory use.
pub fn decode_to_vec(input: &[u8], capacity: usize) -> Result<Vec<u8>> {
    let mut arena = Arena::new(capacity);
    decode(input, &mut arena)?;
    Ok(arena.as_slice().to_vec())
}

/// Walk the block prefixes without decoding any tokens.
pub fn scan_blocks(input: &[u8]) -> Result<(ContainerHeader, Vec<BlockInfo>)> {
    let header = ContainerHeader::sniff(input)?;
    let mut decoder = BlockDecoder::new(input, header.version);
    let mut blocks = Vec::new();
    while let Some(block) = decoder.next_block()? {
        decoder.pos += block.declared_len;
        blocks.push(block);
    }
    Ok((header, blocks))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
