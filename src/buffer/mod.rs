//! Buffer management for target output

use bytes::{Bytes, BytesMut};

/// Holds target output that no expectation has consumed yet.
///
/// A successful match splits the buffer: everything up to the match becomes
/// the match's `before`, the match itself is handed out, and the remainder
/// stays for the next expectation.
pub struct BufferManager {
    buffer: BytesMut,
}

impl BufferManager {
    /// Create a new buffer manager
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append data to the buffer
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get the unmatched bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The region an expectation may search and its offset into the buffer.
    ///
    /// With a search window only the newest `window` bytes are searched.
    pub fn window(&self, window: Option<usize>) -> (usize, &[u8]) {
        let offset = window.map_or(0, |w| self.buffer.len().saturating_sub(w));
        (offset, &self.buffer[offset..])
    }

    /// Consume a match spanning `start..end`, returning `(before, matched)`.
    pub fn consume(&mut self, start: usize, end: usize) -> (Bytes, Bytes) {
        let end = end.min(self.buffer.len());
        let start = start.min(end);
        let mut head = self.buffer.split_to(end);
        let matched = head.split_off(start);
        (head.freeze(), matched.freeze())
    }

    /// Take everything still buffered.
    pub fn take_all(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}
