//! Constant-candidate feed for benchmarking the engine without I/O.
//!
//! Reports an unbounded keyspace, yields the same candidate forever, and
//! accepts any seek.

use super::{FeedConfig, FeedCursor, FeedError, FeedSource, PW_MAX};
use crate::events::EventSink;

/// Candidate produced by every `next` call.
pub const NULL_CANDIDATE: &[u8] = b"Password1";

/// `global_init` entry for [`super::NULL_FEED`].
pub fn global_init(config: &FeedConfig) -> Result<Box<dyn FeedSource>, FeedError> {
    config.validate()?;
    Ok(Box::new(NullFeed))
}

#[derive(Debug, Default)]
pub struct NullFeed;

impl FeedSource for NullFeed {
    fn keyspace(&mut self, _events: &dyn EventSink) -> Result<u64, FeedError> {
        Ok(u64::MAX)
    }

    fn open_cursor(&self, _device: usize) -> Result<Box<dyn FeedCursor + '_>, FeedError> {
        Ok(Box::new(NullCursor { line: 0 }))
    }
}

#[derive(Debug)]
pub struct NullCursor {
    line: u64,
}

impl FeedCursor for NullCursor {
    fn next(&mut self, out: &mut [u8; PW_MAX]) -> Result<usize, FeedError> {
        out[..NULL_CANDIDATE.len()].copy_from_slice(NULL_CANDIDATE);
        self.line = self.line.saturating_add(1);
        Ok(NULL_CANDIDATE.len())
    }

    fn seek(&mut self, line: u64) -> Result<(), FeedError> {
        self.line = line;
        Ok(())
    }

    fn line(&self) -> u64 {
        self.line
    }
}
