//! Persisted seek index: reuse, rejection, and rebuild through the feed.

use std::fs;

use crate::support::{numbered_words, reference_lines, Workspace};
use wordfeed::{SeekDbCache, SeekIndex, PW_MAX};

fn first_event(events: &wordfeed::VecEventSink) -> String {
    events.take_lines().into_iter().next().unwrap_or_default()
}

#[test]
fn corrupt_side_file_is_replaced() {
    let ws = Workspace::new(&numbered_words(200));
    let (mut host, _) = ws.host(16);
    host.global_keyspace().unwrap();
    host.global_term();

    let files = ws.cache_files();
    assert_eq!(files.len(), 1);
    let mut bytes = fs::read(&files[0]).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&files[0], &bytes).unwrap();

    let (mut host, events) = ws.host(16);
    assert_eq!(host.global_keyspace().unwrap(), 200);
    assert!(first_event(&events).contains("cache_generate"));
    host.global_term();

    // The rebuilt entry is valid again.
    let (mut host, events) = ws.host(16);
    assert_eq!(host.global_keyspace().unwrap(), 200);
    assert!(first_event(&events).contains("cache_hit"));
}

#[test]
fn truncated_side_file_is_replaced() {
    let ws = Workspace::new(&numbered_words(50));
    let (mut host, _) = ws.host(4);
    host.global_keyspace().unwrap();
    host.global_term();

    let files = ws.cache_files();
    let bytes = fs::read(&files[0]).unwrap();
    fs::write(&files[0], &bytes[..bytes.len() / 3]).unwrap();

    let (mut host, events) = ws.host(4);
    assert_eq!(host.global_keyspace().unwrap(), 50);
    assert!(first_event(&events).contains("cache_generate"));
}

#[test]
fn different_step_rebuilds() {
    let ws = Workspace::new(&numbered_words(64));
    let (mut host, _) = ws.host(4);
    host.global_keyspace().unwrap();
    host.global_term();

    let (mut host, events) = ws.host(8);
    assert_eq!(host.global_keyspace().unwrap(), 64);
    assert!(first_event(&events).contains("cache_generate"));
    host.global_term();

    let cache = SeekDbCache::new(Some(ws.cache_dir()));
    let source = fs::canonicalize(&ws.wordlist).unwrap();
    let size = fs::metadata(&source).unwrap().len();
    let index = cache.try_load(&source, size, 8).unwrap();
    assert_eq!(index.step(), 8);
    assert_eq!(index.entries().len(), 8);
}

#[test]
fn disabled_cache_writes_nothing() {
    let ws = Workspace::new(b"a\nb\nc\n");
    let events = std::sync::Arc::new(wordfeed::VecEventSink::new());
    let sink: std::sync::Arc<dyn wordfeed::EventSink> = events.clone();
    let mut host =
        wordfeed::FeedHost::global_init(&wordfeed::WORDLIST_FEED, ws.config().without_cache(), sink)
            .unwrap();
    assert_eq!(host.global_keyspace().unwrap(), 3);
    assert!(first_event(&events).contains("cache_generate"));
    assert!(ws.cache_files().is_empty());

    // The in-memory index still serves seeks.
    let mut device = host.thread_init(0).unwrap();
    device.seek(2).unwrap();
    let mut out = [0u8; PW_MAX];
    let len = device.next(&mut out).unwrap();
    assert_eq!(&out[..len], b"c");
}

#[test]
fn loaded_index_matches_fresh_build() {
    let contents = numbered_words(500);
    let ws = Workspace::new(&contents);
    let (mut host, _) = ws.host(32);
    host.global_keyspace().unwrap();
    host.global_term();

    let cache = SeekDbCache::new(Some(ws.cache_dir()));
    let source = fs::canonicalize(&ws.wordlist).unwrap();
    let loaded = cache
        .try_load(&source, contents.len() as u64, 32)
        .unwrap();
    assert_eq!(loaded, SeekIndex::build(&contents, 32));
    assert_eq!(loaded.line_count(), reference_lines(&contents).len() as u64);
}

#[test]
fn unwritable_cache_emits_diagnostic() {
    let ws = Workspace::new(b"a\nb\n");
    // A regular file where the cache directory should be.
    fs::write(ws.cache_dir(), b"not a directory").unwrap();

    let (mut host, events) = ws.host(2);
    assert_eq!(host.global_keyspace().unwrap(), 2);
    let lines = events.take_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("cache_generate"));
    assert!(lines[1].contains("\"type\":\"diagnostic\""));
    assert!(lines[1].contains("\"level\":\"warn\""));
}
