//! Hand-rolled capability doubles for integration tests

use sidcap_rs::source::{ByteSource, ProducerLiveness, ReadOutcome};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Producer that stays alive for a fixed number of idle checks
pub struct ScriptedLiveness {
    remaining: usize,
    checks: Arc<Mutex<usize>>,
}

impl ScriptedLiveness {
    pub fn alive_for(checks: usize) -> Self {
        Self {
            remaining: checks,
            checks: Arc::new(Mutex::new(0)),
        }
    }

    /// Shared counter of `is_alive` calls
    pub fn checks(&self) -> Arc<Mutex<usize>> {
        self.checks.clone()
    }
}

impl ProducerLiveness for ScriptedLiveness {
    fn is_alive(&mut self) -> bool {
        *self.checks.lock().unwrap() += 1;
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Source that blocks for `delay` after its first read, then delivers
/// `data` and reports end of input
pub struct DelayedSource {
    delay: Duration,
    data: Vec<u8>,
    first_read: Option<Instant>,
}

impl DelayedSource {
    pub fn new(delay: Duration, data: impl Into<Vec<u8>>) -> Self {
        Self {
            delay,
            data: data.into(),
            first_read: None,
        }
    }
}

impl ByteSource for DelayedSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let first_read = *self.first_read.get_or_insert_with(Instant::now);
        if first_read.elapsed() < self.delay {
            return Ok(ReadOutcome::WouldBlock);
        }
        if self.data.is_empty() {
            return Ok(ReadOutcome::Closed);
        }
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.drain(..n);
        Ok(ReadOutcome::Data(n))
    }
}
