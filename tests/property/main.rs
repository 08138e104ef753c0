//! Property-based tests for seeking and device independence.
//!
//! Run with: `cargo test --test property`

mod seek_equivalence;

use std::path::PathBuf;

use tempfile::TempDir;
use wordfeed::{DeviceFeed, EventSink, FeedConfig, FeedHost, NullEventSink, PW_MAX, WORDLIST_FEED};

/// Cases per property; `PROPTEST_CASES` overrides, local runs stay small.
pub fn cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24)
}

pub struct Fixture {
    _dir: TempDir,
    pub host: FeedHost,
}

impl Fixture {
    /// Writes `lines` joined by `\n` (optionally without a final separator)
    /// and starts a host over it.
    pub fn new(lines: &[Vec<u8>], trailing_newline: bool, step: u64) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path: PathBuf = dir.path().join("words.txt");
        let mut bytes = lines.join(&b'\n');
        if trailing_newline {
            bytes.push(b'\n');
        }
        std::fs::write(&path, &bytes).expect("write wordlist");

        let config = FeedConfig::new(["wordlist".to_string(), path.display().to_string()])
            .with_cache_dir(dir.path().join("seekdb"))
            .with_seek_step(step);
        let events: std::sync::Arc<dyn EventSink> = std::sync::Arc::new(NullEventSink);
        let host = FeedHost::global_init(&WORDLIST_FEED, config, events).expect("global_init");
        Self { _dir: dir, host }
    }
}

pub fn next_word(device: &mut DeviceFeed<'_>) -> Option<Vec<u8>> {
    let mut out = [0u8; PW_MAX];
    match device.next(&mut out) {
        Ok(len) => Some(out[..len].to_vec()),
        Err(err) if err.is_end_of_input() => None,
        Err(err) => panic!("unexpected error: {err}"),
    }
}
