//! The raw input buffer behind the suspendable read protocol.
//!
//! Parsers request views with [`ChunkBuffer::view`]; a `None` return is the
//! suspension point, handing control back to the host until the next chunk
//! arrives. Only [`ChunkBuffer::advance`] shrinks the window and only
//! [`ChunkBuffer::push`] grows it; parsers never hold a view across either.

/// Append-only byte window with a logical read position.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    buf: Vec<u8>,
    head: usize,
    read_position: u64,
    total_in: u64,
    flushing: bool,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an incoming chunk, compacting consumed bytes first.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.head > 0 {
            self.buf.drain(..self.head);
            self.head = 0;
        }

        self.buf.extend_from_slice(chunk);
        self.total_in += chunk.len() as u64;
    }

    /// Unconsumed bytes currently buffered.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.head
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    /// The read protocol: a view from `offset` once more than `min_bytes`
    /// are buffered past it, `None` to suspend. When flushing, returns
    /// whatever remains (possibly empty) instead of suspending.
    pub fn view(&self, min_bytes: usize, offset: usize) -> Option<&[u8]> {
        let bytes = self.bytes();

        if bytes.len() > min_bytes + offset {
            Some(&bytes[offset..])
        } else if self.flushing {
            Some(&bytes[offset.min(bytes.len())..])
        } else {
            None
        }
    }

    /// Drops the first `n` unconsumed bytes, invalidating prior views.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.remaining());
        self.head += n;
        self.read_position += n as u64;
    }

    /// Absolute position of the next unconsumed byte.
    pub fn read_position(&self) -> u64 {
        self.read_position
    }

    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    pub fn flushing(&self) -> bool {
        self.flushing
    }

    /// Switches reads to drain mode: short views instead of suspension.
    pub fn set_flushing(&mut self, flushing: bool) {
        self.flushing = flushing;
    }
}
