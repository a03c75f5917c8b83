// Compressed container format.
//
// # Modules
//
// - `header` : 12-byte header sniffing, version detection, normalization
// - `arena`  : Fixed-capacity byte arena shared by input and output
// - `decoder`: Block-length framing and LZ77 token decoding

pub mod arena;
pub mod decoder;
pub mod header;

pub use arena::{Arena, DEFAULT_CAPACITY};
pub use decoder::{BlockDecoder, BlockInfo, decode, decode_to_vec, decode_with_header, scan_blocks};
pub use header::{CANONICAL_TAG, ContainerHeader, FormatVersion, HEADER_LEN};
