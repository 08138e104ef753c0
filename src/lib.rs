//! Candidate feed for a distributed password-recovery engine.
//!
//! ## Scope
//! Streams ordered candidate words from a wordlist to every compute device
//! and lets each device resume at an arbitrary logical line, for
//! checkpoint/restore and for splitting work across devices and hosts.
//!
//! ## Key invariants
//! - Every device owns its own mapping and cursor; nothing mutable is shared.
//! - The seek index is built or loaded once, before any device starts, and
//!   is read-only afterwards.
//! - Candidates are at most [`PW_MAX`] bytes; longer records are truncated
//!   on output but skipped in full.
//! - A persisted index is reused only for the exact path and byte size it
//!   was built from. Anything else is a silent rebuild.
//!
//! ## Flow
//! `global_init -> global_keyspace (load or build seekdb) -> thread_init per
//! device -> next / seek -> thread_term -> global_term`
//!
//! ## Notable entry points
//! - [`FeedHost`] / [`DeviceFeed`]: the engine-facing lifecycle.
//! - [`FeedPlugin`], [`FeedSource`], [`FeedCursor`]: the plugin contract.
//! - [`WORDLIST_FEED`] and [`NULL_FEED`]: the built-in feeds.
//! - [`SeekIndex`] / [`SeekDbCache`]: the sparse line index and its cache.

pub mod events;
pub mod feed;
pub mod mapped;
pub mod seekdb;

pub use events::{EventSink, FeedEvent, JsonlEventSink, NullEventSink, VecEventSink};
pub use feed::host::{DeviceFeed, FeedHost, GlobalContext, ERROR_MSG_MAX};
pub use feed::{
    plugin_by_name, FeedConfig, FeedCursor, FeedError, FeedErrorKind, FeedOptions, FeedPlugin,
    FeedSource, BUILTIN_FEEDS, FEED_PLUGIN_VERSION, NULL_FEED, PW_MAX, WORDLIST_FEED,
};
pub use seekdb::{SeekDbCache, SeekIndex, SEEKDB_STEP};

#[cfg(feature = "fuzzing")]
pub use seekdb::fuzz_try_load;
