//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use sidcap_rs::session::SessionOptions;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Session timing that ends as soon as the source runs dry
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        read_chunk_size: 13,
        quiescence: Duration::ZERO,
        poll_backoff: Duration::ZERO,
        progress_interval: Duration::from_secs(3600),
    }
}

/// Decompress a text capture into its lines
pub fn read_text_capture(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut decoder = zstd::stream::read::Decoder::new(file).unwrap();
    let mut text = String::new();
    decoder.read_to_string(&mut text).unwrap();
    text.lines().map(str::to_string).collect()
}
