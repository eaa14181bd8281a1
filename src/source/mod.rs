//! Byte sources and producer liveness
//!
//! The capture core only sees the producer through two capabilities:
//!
//! - [`ByteSource`] - a non-blocking readable stream (the dump fifo)
//! - [`ProducerLiveness`] - whether the producer process is still running
//!
//! Implementations:
//!
//! - [`FileSource`] - a fifo or regular file opened non-blocking, waiting on
//!   readiness with `poll(2)`
//! - [`MemorySource`] - replays prepared chunks, with would-block gaps
//! - [`Detached`] / `std::process::Child` - liveness of no producer or of a
//!   spawned child process

pub mod file;
pub mod liveness;
pub mod memory;

pub use file::FileSource;
pub use liveness::{Detached, ProducerLiveness};
pub use memory::MemorySource;

use std::io;
use std::time::Duration;

#[cfg(test)]
pub use liveness::MockProducerLiveness;

/// Result of one non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were placed at the front of the buffer
    Data(usize),
    /// Nothing available right now
    WouldBlock,
    /// The write side is closed (it may be reopened by a late producer)
    Closed,
}

/// A non-blocking readable byte stream
pub trait ByteSource {
    /// Read up to `buf.len()` bytes without blocking
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Wait until data may be available, for at most `timeout`
    ///
    /// Returning early is always allowed; callers re-check with
    /// [`read_chunk`](Self::read_chunk). The default sleeps for `timeout`.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<()> {
        std::thread::sleep(timeout);
        Ok(())
    }

    /// Short description for logs
    fn describe(&self) -> String {
        "byte source".to_string()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        (**self).read_chunk(buf)
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).wait_readable(timeout)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Map a raw `read` result onto a [`ReadOutcome`]
pub(crate) fn classify_read(result: io::Result<usize>) -> io::Result<ReadOutcome> {
    match result {
        Ok(0) => Ok(ReadOutcome::Closed),
        Ok(n) => Ok(ReadOutcome::Data(n)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(ReadOutcome::WouldBlock),
        Err(e) => Err(e),
    }
}
