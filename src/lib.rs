//! # sidcap-rs: SID register-write capture
//!
//! Captures the register-write stream an emulator prints while playing a
//! tune and compacts it into the shortest event log that reproduces the same
//! chip state, written through zstd.
//!
//! ## Architecture
//!
//! ```text
//! ByteSource ──► FrameReader ──► Compactor ──► EventSink
//!  (fifo)         (lines)        (dedup,        (zstd text /
//!                                 masking)        parquet)
//! ```
//!
//! - **Frame**: splits a chunked, non-blocking byte stream into lines
//! - **Compactor**: parses records, masks register values and drops writes
//!   that do not change chip state
//! - **Sink**: streams compacted events to one compressed output file
//! - **Session**: the single-threaded loop tying the above together, ending
//!   once the producer is gone and the source has gone quiet
//!
//! ## Example
//!
//! ```no_run
//! use sidcap_rs::{
//!     config::CaptureConfig,
//!     session::CaptureSession,
//!     sink::open_sink,
//!     source::{Detached, FileSource},
//! };
//!
//! fn main() -> sidcap_rs::Result<()> {
//!     let config = CaptureConfig::default();
//!     let source = FileSource::open("/tmp/dump.fifo")?;
//!     let sink = open_sink(
//!         &config.output,
//!         "tune.dump.zst".as_ref(),
//!         config.compaction.clock_mode,
//!     )?;
//!
//!     let report = CaptureSession::new(
//!         &config,
//!         Box::new(source),
//!         sink,
//!         Box::new(Detached),
//!     )
//!     .run()?;
//!     println!("{} events", report.sink.events_written);
//!     Ok(())
//! }
//! ```

pub mod compactor;
pub mod config;
pub mod error;
pub mod frame;
pub mod session;
pub mod sink;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use compactor::{Compactor, CompactorStats, LineOutcome};
pub use config::{CaptureConfig, OutputFormat};
pub use error::{CaptureError, Result, Stage};
pub use frame::FrameReader;
pub use session::{CaptureSession, SessionReport, SessionSummary};
pub use sink::{open_sink, EventSink, SinkReport};
pub use source::{ByteSource, Detached, FileSource, MemorySource, ProducerLiveness, ReadOutcome};
pub use types::{ClockMode, CompactedEvent, RawRecord, RecordLayout};
