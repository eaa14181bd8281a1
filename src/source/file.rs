//! Non-blocking fifo / file source

use super::{classify_read, ByteSource, ReadOutcome};
use crate::error::{CaptureError, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reads the producer's dump from a fifo or a regular file
///
/// On unix the file is opened with `O_NONBLOCK`, so opening a fifo does not
/// wait for a writer and reads never stall the session loop.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    /// The last read hit end of file
    at_eof: bool,
}

impl FileSource {
    /// Open `path` for non-blocking reads
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.read(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_NONBLOCK);
        }
        let file = options
            .open(path)
            .map_err(|e| CaptureError::io("open", path, e))?;

        tracing::debug!("Opened input {:?}", path);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            at_eof: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn poll_readable(&self, timeout: Duration) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // Round up so a sub-millisecond backoff still blocks
        let millis = timeout
            .as_micros()
            .div_ceil(1000)
            .min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `pfd` is a single valid pollfd that outlives the call, and
        // the descriptor stays open because `self.file` is borrowed.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        // A fifo without a writer reports hang-up at once
        if pfd.revents & libc::POLLHUP != 0 && pfd.revents & libc::POLLIN == 0 {
            std::thread::sleep(timeout);
        }
        Ok(())
    }
}

impl ByteSource for FileSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let outcome = classify_read(self.file.read(buf))?;
        self.at_eof = outcome == ReadOutcome::Closed;
        Ok(outcome)
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<()> {
        // End of file is always "readable", so readiness tells us nothing
        if self.at_eof {
            std::thread::sleep(timeout);
            return Ok(());
        }

        #[cfg(unix)]
        {
            self.poll_readable(timeout)
        }
        #[cfg(not(unix))]
        {
            std::thread::sleep(timeout);
            Ok(())
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
