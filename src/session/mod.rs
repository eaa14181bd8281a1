//! Capture sessions
//!
//! A session owns one frame reader, one compactor and one sink for the whole
//! lifetime of a producer run. Nothing is shared between sessions; capturing
//! several tunes means running several sessions.
//!
//! # Termination
//!
//! The loop ends once the producer reports it is no longer alive *and* no
//! byte has arrived for the quiescence window. The remaining partial line is
//! then drained and the sink finished.

pub mod driver;
pub mod summary;
pub mod types;

pub use driver::CaptureSession;
pub use summary::{summary_path, SessionSummary};
pub use types::{SessionOptions, SessionReport};
