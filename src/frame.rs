//! Line framing over a chunked byte stream
//!
//! [`FrameReader`] accumulates bytes as they arrive from the source, at any
//! granularity, and hands out complete newline-terminated lines. The trailing
//! partial line stays buffered until more bytes arrive or the session ends and
//! [`FrameReader::finish`] flushes it as the last line.
//!
//! Lines are decoded as UTF-8 one at a time. A newline byte never occurs
//! inside a multi-byte UTF-8 sequence, so a chunk boundary that splits a
//! character is harmless; a line that does not decode is surfaced as
//! [`CaptureError::Decode`].

use crate::error::{CaptureError, Result};
use serde::Serialize;

/// Counters kept by the frame reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// Complete lines handed out, including the final drained tail
    pub lines_framed: u64,
    /// Bytes accepted from the source
    pub bytes_received: u64,
    /// Non-empty chunks accepted
    pub chunks_received: u64,
}

/// Splits a byte stream into lines
#[derive(Debug)]
pub struct FrameReader {
    /// Accumulated bytes; `buf[..start]` has already been handed out
    buf: Vec<u8>,
    /// Start of the first line not yet handed out
    start: usize,
    /// Position to resume the newline search from
    scan_from: usize,
    /// Stream offset of `buf[0]`
    base_offset: u64,
    /// Longest line accepted, excluding the terminator
    max_line_len: Option<usize>,
    stats: FrameStats,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(None)
    }
}

impl FrameReader {
    /// Create a frame reader with an optional line-length cap
    pub fn new(max_line_len: Option<usize>) -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            scan_from: 0,
            base_offset: 0,
            max_line_len,
            stats: FrameStats::default(),
        }
    }

    /// Append a chunk of bytes
    ///
    /// An empty chunk means the source had nothing to offer and is a no-op.
    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.compact();
        self.buf.extend_from_slice(chunk);
        self.stats.bytes_received += chunk.len() as u64;
        self.stats.chunks_received += 1;
    }

    /// Take the next complete line, if one is buffered
    ///
    /// The returned line excludes the `\n` terminator and a preceding `\r`.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        let newline = self.buf[self.scan_from..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|pos| self.scan_from + pos);

        match newline {
            Some(end) => {
                let start = self.start;
                self.start = end + 1;
                self.scan_from = self.start;
                self.take_line(start, end).map(Some)
            }
            None => {
                self.scan_from = self.buf.len();
                // A pending `\r` may still turn out to be part of the terminator
                self.check_length(self.start, self.content_end(self.start, self.buf.len()))?;
                Ok(None)
            }
        }
    }

    /// Flush the buffered tail as the final line
    ///
    /// Called once the source is exhausted. The tail is returned even
    /// without a trailing newline; an empty tail yields `None`.
    pub fn finish(&mut self) -> Result<Option<&str>> {
        let (start, end) = (self.start, self.buf.len());
        if start == end {
            return Ok(None);
        }
        self.start = end;
        self.scan_from = end;
        self.take_line(start, end).map(Some)
    }

    /// Number of buffered bytes not yet handed out
    pub fn pending_len(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Counters since creation
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// End of the line content in `start..end`, excluding a trailing `\r`
    fn content_end(&self, start: usize, end: usize) -> usize {
        if end > start && self.buf[end - 1] == b'\r' {
            end - 1
        } else {
            end
        }
    }

    fn take_line(&mut self, start: usize, end: usize) -> Result<&str> {
        let end = self.content_end(start, end);
        self.check_length(start, end)?;

        self.stats.lines_framed += 1;
        let line_no = self.stats.lines_framed;
        let offset = self.base_offset + start as u64;

        std::str::from_utf8(&self.buf[start..end]).map_err(|source| CaptureError::Decode {
            line: line_no,
            offset,
            source,
        })
    }

    fn check_length(&self, start: usize, end: usize) -> Result<()> {
        match self.max_line_len {
            Some(limit) if end - start > limit => Err(CaptureError::LineTooLong {
                limit,
                offset: self.base_offset + start as u64,
            }),
            _ => Ok(()),
        }
    }

    /// Discard bytes that were already handed out
    fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.drain(..self.start);
        self.scan_from -= self.start;
        self.base_offset += self.start as u64;
        self.start = 0;
    }
}
