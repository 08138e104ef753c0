//! Feed plugin contract.
//!
//! # Purpose
//!
//! The compute engine pulls candidates through a fixed capability set and
//! never depends on where they come from:
//!
//! | Scope | Operation | Here |
//! |-------|-----------|------|
//! | global | `global_init` | [`FeedPlugin::global_init`] |
//! | global | `global_keyspace` | [`FeedSource::keyspace`] |
//! | global | `global_term` | drop of the `Box<dyn FeedSource>` |
//! | device | `thread_init` | [`FeedSource::open_cursor`] |
//! | device | `thread_next` | [`FeedCursor::next`] |
//! | device | `thread_seek` | [`FeedCursor::seek`] |
//! | device | `thread_term` | drop of the `Box<dyn FeedCursor>` |
//!
//! [`host::FeedHost`] wraps these into the device-indexed lifecycle the
//! engine drives, with sticky error reporting.
//!
//! # Ownership
//!
//! ```text
//!                  ┌─────────────────────────────────────┐
//!                  │  FeedSource (one per job, Sync)     │
//!                  │  path, seek index, line count       │
//!                  └─────────────────────────────────────┘
//!                     ▲ &            ▲ &             ▲ &
//!          ┌──────────┴──┐  ┌────────┴────┐  ┌───────┴─────┐
//!          │ FeedCursor  │  │ FeedCursor  │  │ FeedCursor  │
//!          │ (device 0)  │  │ (device 1)  │  │ (device N)  │
//!          │ mmap+cursor │  │ mmap+cursor │  │ mmap+cursor │
//!          └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! Cursors borrow their source; a source cannot be torn down while any
//! cursor is alive. `keyspace` takes `&mut self`, so the index is built or
//! loaded strictly before any cursor exists and is read-only afterwards.

pub mod config;
mod errors;
pub mod host;
pub mod null;
pub mod wordlist;

pub use config::FeedConfig;
pub use errors::{FeedError, FeedErrorKind};

use crate::events::EventSink;

/// Capacity of the candidate buffer handed to [`FeedCursor::next`].
pub const PW_MAX: usize = 256;

/// Contract version spoken by [`host::FeedHost`].
pub const FEED_PLUGIN_VERSION: u32 = 712;

/// Post-processing the engine may apply to a feed's candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedOptions(u32);

impl FeedOptions {
    pub const NONE: Self = Self(0);
    /// Candidates may be `$HEX[...]` encoded.
    pub const AUTOHEX: Self = Self(1 << 0);
    /// Candidates may be charset-converted.
    pub const ICONV: Self = Self(1 << 1);
    /// Candidates may be fed through mangling rules.
    pub const RULES: Self = Self(1 << 2);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Global-scope half of a feed: one instance per job.
pub trait FeedSource: Send + Sync {
    /// Total number of candidates.
    ///
    /// May do expensive one-time work (index build) on the first call;
    /// later calls return the cached value.
    fn keyspace(&mut self, events: &dyn EventSink) -> Result<u64, FeedError>;

    /// Creates the per-device context for `device`.
    fn open_cursor(&self, device: usize) -> Result<Box<dyn FeedCursor + '_>, FeedError>;
}

/// Device-scope half of a feed: one instance per concurrent consumer.
///
/// Never shared; each device drives its own cursor sequentially.
pub trait FeedCursor: Send {
    /// Writes the next candidate into `out` and returns its length.
    ///
    /// Returns [`FeedError::EndOfInput`] once the stream is exhausted.
    fn next(&mut self, out: &mut [u8; PW_MAX]) -> Result<usize, FeedError>;

    /// Repositions so the following `next` yields logical line `line`.
    fn seek(&mut self, line: u64) -> Result<(), FeedError>;

    /// Logical line the following `next` would yield.
    fn line(&self) -> u64;
}

/// Constructor signature shared by every feed.
pub type GlobalInitFn = fn(&FeedConfig) -> Result<Box<dyn FeedSource>, FeedError>;

/// Function-pointer table describing one feed implementation.
#[derive(Clone, Copy)]
pub struct FeedPlugin {
    pub name: &'static str,
    pub version: u32,
    pub options: FeedOptions,
    pub global_init: GlobalInitFn,
}

impl std::fmt::Debug for FeedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPlugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Memory-mapped wordlist with a persistent seek index.
pub const WORDLIST_FEED: FeedPlugin = FeedPlugin {
    name: "wordlist",
    version: FEED_PLUGIN_VERSION,
    options: FeedOptions::AUTOHEX
        .union(FeedOptions::ICONV)
        .union(FeedOptions::RULES),
    global_init: wordlist::global_init,
};

/// Constant-candidate benchmark feed.
pub const NULL_FEED: FeedPlugin = FeedPlugin {
    name: "null",
    version: FEED_PLUGIN_VERSION,
    options: FeedOptions::NONE,
    global_init: null::global_init,
};

/// Every feed compiled into this crate.
pub const BUILTIN_FEEDS: &[FeedPlugin] = &[WORDLIST_FEED, NULL_FEED];

/// Looks up a built-in feed by name.
#[must_use]
pub fn plugin_by_name(name: &str) -> Option<&'static FeedPlugin> {
    BUILTIN_FEEDS.iter().find(|plugin| plugin.name == name)
}
