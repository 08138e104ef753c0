//! Sparse line-to-offset index ("seekdb") and its on-disk cache.
//!
//! A [`SeekIndex`] records the byte offset of every `step`-th logical line
//! of a source file, so seeking to line `L` costs one table lookup plus at
//! most `step - 1` separator scans instead of a walk from byte 0.
//!
//! Building the index needs one full pass over the file. The result is
//! persisted by [`SeekDbCache`] so later runs can skip the pass.
//!
//! # File format
//!
//! ```text
//! | MAGIC (8B): b"WFSEEKDB"                       |
//! | VERSION (4B, LE u32) | RESERVED (4B)          |
//! | STEP (8B, LE u64)                             |
//! | KEY_HASH (32B): blake3(tag, path, file size)  |
//! | FILE_SIZE (8B) | LINE_COUNT (8B)              |
//! | ENTRY_COUNT (8B)                              |
//! | ENTRIES (ENTRY_COUNT x 8B, LE u64)            |
//! | CHECKSUM (32B): blake3 of everything above    |
//! ```
//!
//! # Identity
//!
//! The side file is named after a hash of the absolute source path, so a
//! resized source overwrites its own stale entry. Inside the file,
//! `KEY_HASH` binds the entry to the path *and* the byte size it was built
//! from, and `FILE_SIZE` is compared against the live file. Any mismatch is
//! a cache miss, never an error.
//!
//! # Invariants
//! - `entries[0] == 0` and entries are strictly increasing.
//! - `entries.len() == ceil(line_count / step)`.
//! - Every entry is `< file_size`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::mapped::SEPARATOR;

/// Default sampling interval in logical lines.
pub const SEEKDB_STEP: u64 = 8192;

/// Magic bytes at the start of every side file.
const MAGIC: &[u8; 8] = b"WFSEEKDB";

/// Format version. Bump on any layout change.
const VERSION: u32 = 1;

/// Domain separation tag for identity and file-name hashes.
const DOMAIN_TAG: &[u8] = b"wordfeed-seekdb-v1:blake3";

/// 8 (magic) + 4 (version) + 4 (reserved) + 8 (step) + 32 (key hash)
/// + 8 (file size) + 8 (line count) + 8 (entry count).
const HEADER_LEN: usize = 80;

const CHECKSUM_LEN: usize = 32;

/// Side-file extension.
const EXTENSION: &str = "seekdb";

/// Sparse, ordered table of sampled line offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeekIndex {
    step: u64,
    file_size: u64,
    line_count: u64,
    entries: Vec<u64>,
}

impl SeekIndex {
    /// Builds the index with one pass over `bytes`.
    ///
    /// `step` is clamped to at least 1.
    #[must_use]
    pub fn build(bytes: &[u8], step: u64) -> Self {
        let step = step.max(1);
        let len = bytes.len();
        let mut entries = Vec::new();
        if len > 0 {
            entries.push(0);
        }

        let mut line = 0u64;
        for pos in memchr::memchr_iter(SEPARATOR, bytes) {
            line += 1;
            let next = pos + 1;
            if next < len && line % step == 0 {
                entries.push(next as u64);
            }
        }

        // A final record without a trailing separator still counts.
        let line_count = match bytes.last() {
            Some(&SEPARATOR) | None => line,
            Some(_) => line + 1,
        };

        Self {
            step,
            file_size: len as u64,
            line_count,
            entries,
        }
    }

    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Byte size of the source the index was built from.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Authoritative number of logical lines (the keyspace).
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    #[must_use]
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// Returns the sampled `(line, byte_offset)` at or before `line`, or
    /// `None` when the table does not cover it.
    #[inline]
    #[must_use]
    pub fn lookup(&self, line: u64) -> Option<(u64, u64)> {
        let idx = line / self.step;
        let off = *self.entries.get(usize::try_from(idx).ok()?)?;
        Some((idx * self.step, off))
    }
}

/// Reason a side file was not usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMiss {
    Disabled,
    Missing,
    Truncated,
    BadMagic,
    BadVersion { got: u32 },
    StepMismatch { got: u64, expected: u64 },
    IdentityMismatch,
    SizeMismatch { cached: u64, live: u64 },
    Checksum,
    BadEntries,
}

impl CacheMiss {
    /// Whether the side file should be removed.
    fn is_corrupt(self) -> bool {
        !matches!(self, Self::Disabled | Self::Missing)
    }
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("cache disabled"),
            Self::Missing => f.write_str("no side file"),
            Self::Truncated => f.write_str("side file truncated"),
            Self::BadMagic => f.write_str("bad magic"),
            Self::BadVersion { got } => write!(f, "unsupported version {got}"),
            Self::StepMismatch { got, expected } => {
                write!(f, "step mismatch: cached {got}, configured {expected}")
            }
            Self::IdentityMismatch => f.write_str("identity hash mismatch"),
            Self::SizeMismatch { cached, live } => {
                write!(f, "file size changed: cached {cached}, live {live}")
            }
            Self::Checksum => f.write_str("checksum mismatch"),
            Self::BadEntries => f.write_str("entry table inconsistent"),
        }
    }
}

/// On-disk cache of seek indexes.
///
/// A `None` directory disables the cache: loads always miss and stores do
/// nothing.
///
/// Concurrent processes storing the same entry are safe because stores go
/// through a temporary file and a rename; readers never see partial files.
#[derive(Clone, Debug)]
pub struct SeekDbCache {
    dir: Option<PathBuf>,
}

impl SeekDbCache {
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Directory holding the side files, `None` when disabled.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Side-file path for `source`, derived from its absolute path.
    #[must_use]
    pub fn path_for(&self, source: &Path) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let mut hasher = blake3::Hasher::new();
        hash_len_prefixed(&mut hasher, DOMAIN_TAG);
        hash_len_prefixed(&mut hasher, source.as_os_str().as_encoded_bytes());
        let name = hasher.finalize().to_hex();
        Some(dir.join(format!("{name}.{EXTENSION}")))
    }

    /// Loads the index for `source` if a valid entry exists for a file of
    /// exactly `file_size` bytes built with `step`.
    ///
    /// Corrupt or stale side files are deleted as a side effect.
    pub fn try_load(
        &self,
        source: &Path,
        file_size: u64,
        step: u64,
    ) -> Result<SeekIndex, CacheMiss> {
        let path = self.path_for(source).ok_or(CacheMiss::Disabled)?;
        let bytes = std::fs::read(&path).map_err(|_| CacheMiss::Missing)?;
        let key = identity_hash(source, file_size);
        decode(&bytes, &key, file_size, step).map_err(|miss| {
            if miss.is_corrupt() {
                let _ = std::fs::remove_file(&path);
            }
            miss
        })
    }

    /// Persists `index` for `source` (best effort).
    ///
    /// Returns false when the cache is disabled or the write failed;
    /// correctness never depends on persistence.
    pub fn try_store(&self, source: &Path, index: &SeekIndex) -> bool {
        let Some(path) = self.path_for(source) else {
            return false;
        };
        let Some(dir) = path.parent() else {
            return false;
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            tracing::debug!(dir = %dir.display(), %err, "seekdb directory not writable");
            return false;
        }

        let key = identity_hash(source, index.file_size);
        let buf = encode(index, &key);

        let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
        if let Err(err) = std::fs::write(&tmp_path, &buf) {
            tracing::debug!(path = %tmp_path.display(), %err, "seekdb write failed");
            let _ = std::fs::remove_file(&tmp_path);
            return false;
        }
        if let Err(err) = std::fs::rename(&tmp_path, &path) {
            tracing::debug!(path = %path.display(), %err, "seekdb rename failed");
            let _ = std::fs::remove_file(&tmp_path);
            return false;
        }
        true
    }
}

/// Identity hash binding an entry to a source path and byte size.
#[must_use]
pub fn identity_hash(source: &Path, file_size: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hash_len_prefixed(&mut hasher, DOMAIN_TAG);
    hash_len_prefixed(&mut hasher, source.as_os_str().as_encoded_bytes());
    hasher.update(&file_size.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// Serializes `index` into the side-file layout.
#[must_use]
pub fn encode(index: &SeekIndex, key: &[u8; 32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + index.entries.len() * 8 + CHECKSUM_LEN);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&index.step.to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(&index.file_size.to_le_bytes());
    buf.extend_from_slice(&index.line_count.to_le_bytes());
    buf.extend_from_slice(&(index.entries.len() as u64).to_le_bytes());
    for &entry in &index.entries {
        buf.extend_from_slice(&entry.to_le_bytes());
    }
    let checksum = blake3::hash(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

/// Parses and validates a side file.
pub fn decode(
    bytes: &[u8],
    key: &[u8; 32],
    live_size: u64,
    step: u64,
) -> Result<SeekIndex, CacheMiss> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(CacheMiss::Truncated);
    }
    if &bytes[..8] != MAGIC.as_slice() {
        return Err(CacheMiss::BadMagic);
    }
    let version = le_u32(bytes, 8);
    if version != VERSION {
        return Err(CacheMiss::BadVersion { got: version });
    }

    let entry_count = le_u64(bytes, 72);
    let expected_len = usize::try_from(entry_count)
        .ok()
        .and_then(|n| n.checked_mul(8))
        .and_then(|n| n.checked_add(HEADER_LEN + CHECKSUM_LEN))
        .ok_or(CacheMiss::Truncated)?;
    if bytes.len() != expected_len {
        return Err(CacheMiss::Truncated);
    }

    let data_end = expected_len - CHECKSUM_LEN;
    if blake3::hash(&bytes[..data_end]).as_bytes() != &bytes[data_end..] {
        return Err(CacheMiss::Checksum);
    }

    let cached_step = le_u64(bytes, 16);
    if cached_step != step {
        return Err(CacheMiss::StepMismatch {
            got: cached_step,
            expected: step,
        });
    }
    if &bytes[24..56] != key.as_slice() {
        return Err(CacheMiss::IdentityMismatch);
    }
    // The key hash already binds the size; this catches a writer that keyed
    // an entry with a size other than the one it recorded.
    let file_size = le_u64(bytes, 56);
    if file_size != live_size {
        return Err(CacheMiss::SizeMismatch {
            cached: file_size,
            live: live_size,
        });
    }

    let line_count = le_u64(bytes, 64);
    if step == 0 || entry_count != line_count.div_ceil(step) {
        return Err(CacheMiss::BadEntries);
    }

    let entries: Vec<u64> = bytes[HEADER_LEN..data_end]
        .chunks_exact(8)
        .map(|chunk| le_u64(chunk, 0))
        .collect();
    if entries.first().is_some_and(|&first| first != 0)
        || entries.windows(2).any(|w| w[0] >= w[1])
        || entries.last().is_some_and(|&last| last >= file_size)
    {
        return Err(CacheMiss::BadEntries);
    }

    Ok(SeekIndex {
        step,
        file_size,
        line_count,
        entries,
    })
}

/// Feeds `bytes` into `hasher` with a length prefix so adjacent fields
/// cannot alias each other.
#[inline]
fn hash_len_prefixed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[inline]
fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

#[inline]
fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

// ---------------------------------------------------------------------------
// Fuzz entry point
// ---------------------------------------------------------------------------

/// Fuzz entry point: decodes arbitrary bytes as a side file for a fixed
/// identity. Returns true if the bytes were accepted.
#[cfg(feature = "fuzzing")]
pub fn fuzz_try_load(dir: &Path, data: &[u8]) -> bool {
    let cache = SeekDbCache::new(Some(dir.to_path_buf()));
    let source = Path::new("/fuzz/wordlist.txt");
    let Some(path) = cache.path_for(source) else {
        return false;
    };
    if std::fs::write(&path, data).is_err() {
        return false;
    }
    match cache.try_load(source, data.len() as u64, SEEKDB_STEP) {
        Ok(index) => {
            assert_eq!(
                index.entries().len() as u64,
                index.line_count().div_ceil(index.step())
            );
            true
        }
        Err(_) => false,
    }
}
