//! Producer liveness

use std::process::Child;

/// Whether the producer process is still running
///
/// The capture only finishes after the producer is gone, so a source that
/// is momentarily empty is not mistaken for the end of the stream.
#[cfg_attr(test, mockall::automock)]
pub trait ProducerLiveness {
    /// `true` while the producer may still write
    fn is_alive(&mut self) -> bool;
}

impl ProducerLiveness for Child {
    fn is_alive(&mut self) -> bool {
        match self.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::trace!("Producer exited with {}", status);
                false
            }
            Err(e) => {
                tracing::warn!("Failed to query producer status, assuming exited: {}", e);
                false
            }
        }
    }
}

impl<L: ProducerLiveness + ?Sized> ProducerLiveness for Box<L> {
    fn is_alive(&mut self) -> bool {
        (**self).is_alive()
    }
}

/// No producer process to observe
///
/// Used when capturing from a file or a fifo fed by something else; the
/// session then ends after the quiescence window alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl ProducerLiveness for Detached {
    fn is_alive(&mut self) -> bool {
        false
    }
}
