//! Structured feed events, output sinks, and JSONL encoder.
//!
//! # Architecture
//!
//! Feeds emit [`FeedEvent`] values through an [`EventSink`]. The default
//! implementation ([`JsonlEventSink`]) serializes each event as a single
//! JSON line and writes it atomically to the underlying writer.
//!
//! # Wire format
//!
//! Each event is one JSON object followed by `\n`:
//!
//! ```text
//! {"type":"cache_hit","path":"/w.txt","file_size":123,"cached_count":10,"keyspace":10}
//! {"type":"cache_generate","path":"/w.txt","file_size":123,"line_count":10,"entries":1,"elapsed_ms":4,"throughput_mib_s":0.03}
//! {"type":"diagnostic","level":"warn","message":"..."}
//! ```

use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::sync::Mutex;

// ============================================================================
// Event types
// ============================================================================

/// Structured event emitted by a feed.
pub enum FeedEvent<'a> {
    CacheHit(CacheHitEvent<'a>),
    CacheGenerate(CacheGenerateEvent<'a>),
    Diagnostic(DiagnosticEvent<'a>),
}

/// Keyspace answered from a persisted seek index.
pub struct CacheHitEvent<'a> {
    pub path: &'a Path,
    pub file_size: u64,
    pub cached_count: u64,
    pub keyspace: u64,
}

/// Seek index built by a full scan (the expensive path).
pub struct CacheGenerateEvent<'a> {
    pub path: &'a Path,
    pub file_size: u64,
    pub line_count: u64,
    /// Number of sampled offsets in the index.
    pub entries: u64,
    pub elapsed_ms: u64,
    pub throughput_mib_s: f64,
}

pub struct DiagnosticEvent<'a> {
    pub level: &'static str,
    pub message: &'a str,
}

// ============================================================================
// Traits
// ============================================================================

/// Thread-safe sink for structured feed events.
///
/// Implementations must tolerate concurrent calls from device threads.
pub trait EventSink: Send + Sync {
    /// Serialize and write a single event. Must not block indefinitely.
    fn emit(&self, event: FeedEvent<'_>);
    /// Flush any buffered output.
    fn flush(&self);
}

/// Encodes a [`FeedEvent`] into bytes.
pub trait EventEncoder: Send + Sync {
    /// Append the encoded representation of `event` to `buf`.
    fn encode(&self, event: &FeedEvent<'_>, buf: &mut Vec<u8>);
}

// ============================================================================
// JSONL encoder
// ============================================================================

/// JSONL encoder: one JSON object per line, no serde.
#[derive(Default)]
pub struct JsonlEncoder;

impl JsonlEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl EventEncoder for JsonlEncoder {
    fn encode(&self, event: &FeedEvent<'_>, buf: &mut Vec<u8>) {
        match event {
            FeedEvent::CacheHit(e) => encode_cache_hit(e, buf),
            FeedEvent::CacheGenerate(e) => encode_cache_generate(e, buf),
            FeedEvent::Diagnostic(d) => encode_diagnostic(d, buf),
        }
        buf.push(b'\n');
    }
}

fn encode_cache_hit(e: &CacheHitEvent<'_>, buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"{\"type\":\"cache_hit\",\"path\":\"");
    write_json_bytes(e.path.as_os_str().as_encoded_bytes(), buf);
    buf.extend_from_slice(b"\",\"file_size\":");
    write_u64(e.file_size, buf);
    buf.extend_from_slice(b",\"cached_count\":");
    write_u64(e.cached_count, buf);
    buf.extend_from_slice(b",\"keyspace\":");
    write_u64(e.keyspace, buf);
    buf.push(b'}');
}

fn encode_cache_generate(e: &CacheGenerateEvent<'_>, buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"{\"type\":\"cache_generate\",\"path\":\"");
    write_json_bytes(e.path.as_os_str().as_encoded_bytes(), buf);
    buf.extend_from_slice(b"\",\"file_size\":");
    write_u64(e.file_size, buf);
    buf.extend_from_slice(b",\"line_count\":");
    write_u64(e.line_count, buf);
    buf.extend_from_slice(b",\"entries\":");
    write_u64(e.entries, buf);
    buf.extend_from_slice(b",\"elapsed_ms\":");
    write_u64(e.elapsed_ms, buf);
    buf.extend_from_slice(b",\"throughput_mib_s\":");
    write_rate(e.throughput_mib_s, buf);
    buf.push(b'}');
}

fn encode_diagnostic(d: &DiagnosticEvent<'_>, buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"{\"type\":\"diagnostic\",\"level\":\"");
    write_json_str(d.level, buf);
    buf.extend_from_slice(b"\",\"message\":\"");
    write_json_str(d.message, buf);
    buf.extend_from_slice(b"\"}");
}

// ============================================================================
// JSON primitives (no serde)
// ============================================================================

// `Vec<u8>` writes are infallible, so the `write!` results below are ignored.

fn write_u64(n: u64, buf: &mut Vec<u8>) {
    let _ = write!(buf, "{n}");
}

/// Rate with two decimals. Non-finite or negative rates become `0.00`.
fn write_rate(rate: f64, buf: &mut Vec<u8>) {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 0.0 };
    let _ = write!(buf, "{rate:.2}");
}

fn write_json_str(s: &str, buf: &mut Vec<u8>) {
    escape_into(s.as_bytes(), buf);
}

/// Raw bytes as a JSON string body: valid UTF-8 passes through, every byte
/// of an invalid sequence becomes `\u00XX`.
fn write_json_bytes(mut bytes: &[u8], buf: &mut Vec<u8>) {
    while let Err(err) = std::str::from_utf8(bytes) {
        let (valid, rest) = bytes.split_at(err.valid_up_to());
        escape_into(valid, buf);
        let bad = err.error_len().unwrap_or(rest.len());
        for &byte in &rest[..bad] {
            unicode_escape(byte, buf);
        }
        bytes = &rest[bad..];
    }
    escape_into(bytes, buf);
}

/// Escapes quote, backslash and control bytes; `bytes` must be valid UTF-8.
fn escape_into(bytes: &[u8], buf: &mut Vec<u8>) {
    for &byte in bytes {
        let short: &[u8] = match byte {
            b'"' => b"\\\"",
            b'\\' => b"\\\\",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            0x00..=0x1f => {
                unicode_escape(byte, buf);
                continue;
            }
            _ => {
                buf.push(byte);
                continue;
            }
        };
        buf.extend_from_slice(short);
    }
}

fn unicode_escape(byte: u8, buf: &mut Vec<u8>) {
    let _ = write!(buf, "\\u{byte:04x}");
}

// ============================================================================
// Sinks
// ============================================================================

/// Default buffer size (64 KiB) for buffered JSONL emission.
const DEFAULT_BUF_CAPACITY: usize = 64 * 1024;

/// JSONL event sink: writes one JSON object per line.
///
/// The mutex is held only for `write_all`, not for formatting.
pub struct JsonlEventSink<W: Write + Send> {
    writer: Mutex<BufWriter<W>>,
    encoder: JsonlEncoder,
}

impl<W: Write + Send> JsonlEventSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(BufWriter::with_capacity(DEFAULT_BUF_CAPACITY, writer)),
            encoder: JsonlEncoder::new(),
        }
    }
}

impl<W: Write + Send> EventSink for JsonlEventSink<W> {
    fn emit(&self, event: FeedEvent<'_>) {
        let mut buf = Vec::with_capacity(256);
        self.encoder.encode(&event, &mut buf);

        // A poisoned lock only means another emitter panicked mid-write;
        // the buffer itself is still usable.
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = writer.write_all(&buf) {
            if e.kind() != ErrorKind::BrokenPipe {
                tracing::debug!(error = %e, "jsonl event sink write failed");
            }
        }
    }

    fn flush(&self) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = writer.flush() {
            if e.kind() != ErrorKind::BrokenPipe {
                tracing::debug!(error = %e, "jsonl event sink flush failed");
            }
        }
    }
}

/// Event sink that discards everything.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: FeedEvent<'_>) {}
    fn flush(&self) {}
}

/// Collects JSONL-encoded events in memory (for testing).
#[derive(Default)]
pub struct VecEventSink {
    buf: Mutex<Vec<u8>>,
    encoder: JsonlEncoder,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return all accumulated JSONL bytes.
    pub fn take(&self) -> Vec<u8> {
        let mut buf = self
            .buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *buf)
    }

    /// Drain accumulated events as UTF-8 lines.
    pub fn take_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.take())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl EventSink for VecEventSink {
    fn emit(&self, event: FeedEvent<'_>) {
        let mut tmp = Vec::with_capacity(256);
        self.encoder.encode(&event, &mut tmp);
        self.buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(&tmp);
    }

    fn flush(&self) {}
}
