//! # Stream Buffer for Encoded Bytes
//!
//! Fixed-capacity byte arena that the decode loop refills from a file source.
//!
//! ## Design
//!
//! - **Storage**: one boxed slice allocated up front, never resized
//! - **View**: unread bytes are `data[start..start + len]`
//! - **Invariant**: `start + len <= capacity`
//! - **Compaction**: unread bytes move to offset 0 (order preserved) before
//!   every refill, so a partially resident frame survives the refill

use std::io::{self, Read};

use crate::error::{PlaybackError, Result};

/// Outcome of one [`StreamBuffer::fill_from`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Bytes appended.
    pub added: usize,
    /// The reader reported end of stream.
    pub eof: bool,
}

pub struct StreamBuffer {
    data: Box<[u8]>,
    start: usize,
    len: usize,
}

impl StreamBuffer {
    /// Allocate a buffer of `capacity` bytes.
    ///
    /// Fails with [`PlaybackError::Allocation`] instead of aborting when the
    /// allocator refuses.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| PlaybackError::Allocation { bytes: capacity })?;
        data.resize(capacity, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            start: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Unread bytes currently resident.
    pub fn available(&self) -> usize {
        self.len
    }

    /// Offset of the next unread byte.
    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.start
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// No refill can add bytes until something is consumed.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn unread(&self) -> &[u8] {
        &self.data[self.start..self.start + self.len]
    }

    /// Mark `n` unread bytes as consumed. Consuming more than is resident
    /// empties the buffer.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.start += n;
        self.len -= n;
        if self.len == 0 {
            self.start = 0;
        }
    }

    /// Move unread bytes to offset 0.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.data.copy_within(self.start..self.start + self.len, 0);
        self.start = 0;
    }

    /// Compact, then read from `reader` until the buffer is full or the
    /// reader reports end of stream.
    ///
    /// An error is only returned when nothing could be appended; bytes read
    /// before a failure are kept and the failure resurfaces on the next call.
    pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Fill> {
        self.compact();

        let mut added = 0;
        while self.len < self.capacity() {
            match reader.read(&mut self.data[self.len..]) {
                Ok(0) => return Ok(Fill { added, eof: true }),
                Ok(n) => {
                    self.len += n;
                    added += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if added == 0 => return Err(e),
                Err(e) => {
                    log::debug!("Read failed after {} bytes, keeping partial fill: {}", added, e);
                    break;
                }
            }
        }

        Ok(Fill { added, eof: false })
    }
}
