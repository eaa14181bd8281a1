//! In-memory byte source
//!
//! Replays a prepared sequence of chunks. `None` entries stand for reads
//! that would block, which lets tests and benchmarks reproduce the timing
//! pattern of a slow producer.

use super::{ByteSource, ReadOutcome};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Replays chunks from memory
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    chunks: VecDeque<Option<Vec<u8>>>,
    /// Remainder of a chunk larger than the caller's buffer
    pending: Vec<u8>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that delivers `bytes` as a single chunk
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new().with_chunk(bytes)
    }

    /// Append a data chunk
    pub fn with_chunk(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.chunks.push_back(Some(bytes.into()));
        self
    }

    /// Append `count` reads that would block
    pub fn with_gap(mut self, count: usize) -> Self {
        self.chunks.extend(std::iter::repeat_with(|| None).take(count));
        self
    }
}

impl ByteSource for MemorySource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        if self.pending.is_empty() {
            match self.chunks.pop_front() {
                Some(Some(chunk)) => self.pending = chunk,
                Some(None) => return Ok(ReadOutcome::WouldBlock),
                None => return Ok(ReadOutcome::Closed),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(ReadOutcome::Data(n))
    }

    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
