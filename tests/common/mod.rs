// Container fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER_TAIL: &[u8; 11] = b"\xAA\xBB\xCC\xDD\xEE\xFF\x11\x22\x33\x44\x55";
pub const DDS: [u8; 5] = [b'D', b'D', b'S', 0x20, 0x7C];

/// Token stream builder for one block.
#[derive(Default)]
pub struct BlockBuilder {
    bytes: Vec<u8>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literals followed by a match of `len` bytes at distance `offset`.
    pub fn token(mut self, literals: &[u8], offset: u16, len: usize) -> Self {
        assert!(len >= 4);
        let lit_nib = literals.len().min(15);
        let match_nib = (len - 4).min(15);
        self.bytes.push(((lit_nib as u8) << 4) | match_nib as u8);
        if lit_nib == 15 {
            push_ext(&mut self.bytes, literals.len() - 15);
        }
        self.bytes.extend_from_slice(literals);
        self.bytes.extend_from_slice(&offset.to_le_bytes());
        if match_nib == 15 {
            push_ext(&mut self.bytes, len - 4 - 15);
        }
        self
    }

    /// Final literal-only token of the block.
    pub fn last(mut self, literals: &[u8]) -> Vec<u8> {
        let lit_nib = literals.len().min(15);
        self.bytes.push((lit_nib as u8) << 4);
        if lit_nib == 15 {
            push_ext(&mut self.bytes, literals.len() - 15);
        }
        self.bytes.extend_from_slice(literals);
        self.bytes
    }
}

fn push_ext(out: &mut Vec<u8>, mut rest: usize) {
    while rest >= 255 {
        out.push(255);
        rest -= 255;
    }
    out.push(rest as u8);
}

/// Container with the given version tag and blocks.
pub fn container(tag: u8, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(HEADER_TAIL);
    for block in blocks {
        if tag == 0x07 {
            out.extend_from_slice(&(block.len() as u64).to_le_bytes());
        } else {
            out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(block);
    }
    out
}

/// Standard container holding `body` as literals in a single block.
pub fn literal_container(body: &[u8]) -> Vec<u8> {
    container(0x04, &[BlockBuilder::new().last(body)])
}

/// Normalized header followed by `body`.
pub fn decoded(body: &[u8]) -> Vec<u8> {
    let mut out = vec![0x01];
    out.extend_from_slice(HEADER_TAIL);
    out.extend_from_slice(body);
    out
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}
