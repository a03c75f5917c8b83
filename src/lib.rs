//! bagunpack: decoder for LZ77-compressed game asset containers.
//!
//! The crate provides:
//! - The container format and block decoder (`container`)
//! - Payload extraction, including embedded DDS textures (`extract`)
//! - Output sinks for standalone artifacts and the run-wide dump (`io`)
//! - A per-file pipeline over reusable arenas (`engine`)
//! - Path resolution and failure reporting (`asset`, `report`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use bagunpack::container::{self, Arena};
//!
//! let input = std::fs::read("rock.bmap").unwrap();
//! let mut arena = Arena::default();
//! let header = container::decode(&input, &mut arena).unwrap();
//! println!("{:?}: {} bytes", header.version, arena.len());
//! ```

pub mod asset;
pub mod container;
pub mod engine;
pub mod error;
pub mod extract;
pub mod io;
pub mod report;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{FileReport, RunSummary, Stage, UnpackOptions, Unpacker};
pub use error::{Error, ErrorKind, Result};
