//! End-to-end behavior of the wordlist feed through `FeedHost`.

use wordfeed::{FeedErrorKind, FeedHost, NullEventSink, PW_MAX, WORDLIST_FEED};

use crate::support::{drain, numbered_words, reference_lines, Workspace};

#[test]
fn keyspace_matches_reference_count_and_survives_reload() {
    let contents = numbered_words(1000);
    let ws = Workspace::new(&contents);

    let (mut host, events) = ws.host(64);
    assert_eq!(host.global_keyspace().unwrap(), 1000);
    host.global_term();
    let lines = events.take_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"type\":\"cache_generate\""));
    assert!(lines[0].contains("\"line_count\":1000"));
    assert_eq!(ws.cache_files().len(), 1);

    let (mut host, events) = ws.host(64);
    assert_eq!(host.global_keyspace().unwrap(), 1000);
    host.global_term();
    let lines = events.take_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"type\":\"cache_hit\""));
    assert!(lines[0].contains("\"keyspace\":1000"));
}

#[test]
fn seek_then_next_matches_linear_scan() {
    let contents = numbered_words(300);
    let expected = reference_lines(&contents);
    let ws = Workspace::new(&contents);
    let (mut host, _) = ws.host(16);
    host.global_keyspace().unwrap();

    let mut device = host.thread_init(0).unwrap();
    let mut out = [0u8; PW_MAX];
    // Forward, backward, repeated and boundary targets.
    for target in [0u64, 1, 15, 16, 17, 299, 150, 3, 3, 64, 200, 0] {
        device.seek(target).unwrap();
        assert_eq!(device.line(), target);
        let len = device.next(&mut out).unwrap();
        assert_eq!(&out[..len], expected[target as usize].as_slice(), "line {target}");
    }
    device.term();
    host.global_term();
}

#[test]
fn seek_without_index_scans() {
    let contents = numbered_words(50);
    let expected = reference_lines(&contents);
    let ws = Workspace::new(&contents);
    let (host, _) = ws.host(8);

    let mut device = host.thread_init(0).unwrap();
    let mut out = [0u8; PW_MAX];
    for target in [40u64, 10, 49] {
        device.seek(target).unwrap();
        let len = device.next(&mut out).unwrap();
        assert_eq!(&out[..len], expected[target as usize].as_slice());
    }
    let err = device.seek(51).unwrap_err();
    assert_eq!(err.kind(), FeedErrorKind::Range);
}

#[test]
fn seek_past_end_is_range_error() {
    let ws = Workspace::new(b"a\nb\nc\n");
    let (mut host, _) = ws.host(2);
    assert_eq!(host.global_keyspace().unwrap(), 3);

    let mut device = host.thread_init(0).unwrap();
    let err = device.seek(3).unwrap_err();
    assert_eq!(err.kind(), FeedErrorKind::Range);

    // The device stays usable after a rejected seek.
    device.seek(2).unwrap();
    let mut out = [0u8; PW_MAX];
    let len = device.next(&mut out).unwrap();
    assert_eq!(&out[..len], b"c");
    drop(device);
    assert!(host.context().has_error());
}

#[test]
fn appended_data_invalidates_cached_index() {
    let contents = numbered_words(100);
    let ws = Workspace::new(&contents);
    let (mut host, _) = ws.host(8);
    assert_eq!(host.global_keyspace().unwrap(), 100);
    host.global_term();

    let mut grown = contents.clone();
    grown.extend_from_slice(b"extra1\nextra2\n");
    std::fs::write(&ws.wordlist, &grown).unwrap();

    let (mut host, events) = ws.host(8);
    assert_eq!(host.global_keyspace().unwrap(), 102);
    let lines = events.take_lines();
    assert!(lines[0].contains("\"type\":\"cache_generate\""));

    let mut device = host.thread_init(0).unwrap();
    device.seek(101).unwrap();
    let mut out = [0u8; PW_MAX];
    let len = device.next(&mut out).unwrap();
    assert_eq!(&out[..len], b"extra2");
}

#[test]
fn long_record_is_truncated_but_fully_skipped() {
    let mut contents = Vec::new();
    contents.extend_from_slice(b"short\n");
    contents.extend(std::iter::repeat(b'x').take(PW_MAX + 100));
    contents.push(b'\n');
    contents.extend_from_slice(b"after\n");
    let ws = Workspace::new(&contents);
    let (mut host, _) = ws.host(1);
    assert_eq!(host.global_keyspace().unwrap(), 3);

    let mut device = host.thread_init(0).unwrap();
    let words = drain(&mut device);
    assert_eq!(words.len(), 3);
    assert_eq!(words[1].len(), PW_MAX);
    assert!(words[1].iter().all(|&b| b == b'x'));
    assert_eq!(words[2], b"after");

    device.seek(2).unwrap();
    let mut out = [0u8; PW_MAX];
    let len = device.next(&mut out).unwrap();
    assert_eq!(&out[..len], b"after");
}

#[test]
fn crlf_endings_are_stripped() {
    let ws = Workspace::new(b"alpha\r\nbeta\r\ngamma\r\n");
    let (mut host, _) = ws.host(2);
    assert_eq!(host.global_keyspace().unwrap(), 3);
    let mut device = host.thread_init(0).unwrap();
    assert_eq!(drain(&mut device), [b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);
}

#[test]
fn bare_newlines_are_untouched() {
    let ws = Workspace::new(b"alpha\nbe\rta\n\n");
    let (mut host, _) = ws.host(2);
    assert_eq!(host.global_keyspace().unwrap(), 3);
    let mut device = host.thread_init(0).unwrap();
    assert_eq!(drain(&mut device), [b"alpha".to_vec(), b"be\rta".to_vec(), Vec::new()]);
}

#[test]
fn last_record_without_separator_is_yielded_once() {
    let ws = Workspace::new(b"one\ntwo\nthree");
    let (mut host, _) = ws.host(2);
    assert_eq!(host.global_keyspace().unwrap(), 3);

    let mut device = host.thread_init(0).unwrap();
    let mut out = [0u8; PW_MAX];
    device.seek(2).unwrap();
    let len = device.next(&mut out).unwrap();
    assert_eq!(&out[..len], b"three");
    assert!(device.next(&mut out).unwrap_err().is_end_of_input());
    assert!(device.next(&mut out).unwrap_err().is_end_of_input());
    assert!(!host.context().has_error());
}

#[test]
fn empty_wordlist_fails_thread_init() {
    let ws = Workspace::new(b"");
    let host = FeedHost::global_init(
        &WORDLIST_FEED,
        ws.config(),
        std::sync::Arc::new(NullEventSink),
    )
    .unwrap();
    let err = host.thread_init(0).unwrap_err();
    assert_eq!(err.kind(), FeedErrorKind::Io);
    assert!(err.to_string().contains("zero size"));
    assert!(host.context().error_message().unwrap().contains("zero size"));
}

#[test]
fn missing_wordlist_fails_keyspace_with_io_error() {
    let ws = Workspace::new(b"x\n");
    std::fs::remove_file(&ws.wordlist).unwrap();
    let (mut host, _) = ws.host(2);
    let err = host.global_keyspace().unwrap_err();
    assert_eq!(err.kind(), FeedErrorKind::Io);
    assert!(host.context().has_error());
}

#[test]
fn quiet_suppresses_events() {
    let ws = Workspace::new(b"a\nb\n");
    let events = std::sync::Arc::new(wordfeed::VecEventSink::new());
    let sink: std::sync::Arc<dyn wordfeed::EventSink> = events.clone();
    let mut host = FeedHost::global_init(&WORDLIST_FEED, ws.config().quiet(true), sink).unwrap();
    assert_eq!(host.global_keyspace().unwrap(), 2);
    host.global_term();
    assert!(events.take_lines().is_empty());
}
