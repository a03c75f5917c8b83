// Fixed-capacity byte arena.
//
// Used for both the input file and the decoded output. Storage grows on
// demand up to `capacity` and is kept across `reset()` calls, so a run
// allocates at most once per arena regardless of how many files it decodes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Default per-arena capacity (128 MiB).
pub const DEFAULT_CAPACITY: usize = 1 << 27;

#[derive(Debug)]
pub struct Arena {
    buf: Vec<u8>,
    capacity: usize,
}

impl Arena {
    /// Create an empty arena. No memory is reserved until bytes are written.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    /// Maximum number of bytes this arena will ever hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Logical number of bytes written since the last reset.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Forget the previous contents, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Fail with `OutOfBuffer` unless `additional` more bytes fit.
    pub fn ensure_room(&self, additional: usize) -> Result<()> {
        match self.buf.len().checked_add(additional) {
            Some(required) if required <= self.capacity => Ok(()),
            Some(required) => Err(Error::OutOfBuffer {
                required,
                capacity: self.capacity,
            }),
            None => Err(Error::OutOfBuffer {
                required: usize::MAX,
                capacity: self.capacity,
            }),
        }
    }

    /// Append `bytes` verbatim.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_room(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append `len` bytes copied from `offset` bytes behind the write position.
    ///
    /// When `offset < len` the source overlaps the bytes being produced and
    /// the copy repeats the last `offset` bytes, so it must run one byte at a
    /// time in increasing order.
    pub fn copy_match(&mut self, offset: usize, len: usize) -> Result<()> {
        let position = self.buf.len();
        if offset == 0 || offset > position {
            return Err(Error::InvalidMatchOffset { offset, position });
        }
        self.ensure_room(len)?;

        let start = position - offset;
        if offset >= len {
            self.buf.extend_from_within(start..start + len);
        } else {
            self.buf.reserve(len);
            for i in 0..len {
                let byte = self.buf[start + i];
                self.buf.push(byte);
            }
        }
        Ok(())
    }

    /// Replace the contents with the whole file at `path`.
    ///
    /// Files larger than the capacity are rejected before anything is read.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        self.reset();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        let size = usize::try_from(size).map_err(|_| Error::OutOfBuffer {
            required: usize::MAX,
            capacity: self.capacity,
        })?;
        self.ensure_room(size)?;
        self.buf.reserve(size);
        // The file may have grown since the metadata call.
        let limit = (self.capacity as u64).saturating_add(1);
        let read = file.by_ref().take(limit).read_to_end(&mut self.buf)?;
        if read > self.capacity {
            self.buf.truncate(self.capacity);
            return Err(Error::OutOfBuffer {
                required: read,
                capacity: self.capacity,
            });
        }
        Ok(read)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
