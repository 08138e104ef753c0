//! Read-only memory-mapped source files and record splitting.
//!
//! A [`MappedFile`] owns the file handle and one read-only mapping over the
//! whole file. Nothing is copied out of the mapping except the bounded
//! candidate bytes handed to the caller.
//!
//! # Record format
//! Records are separated by `\n`. A final record without a trailing
//! separator is still a record. Trailing `\r` bytes are stripped from what
//! is copied out ([`copy_candidate`]) but never affect how far a cursor
//! advances ([`next_record`]).
//!
//! # Invariants
//! - Mapped files are never empty; opening a zero-size file is an error.
//! - Offsets returned by [`next_record`] and [`skip_records`] are always in
//!   `[0, bytes.len()]`.

use std::fs::File;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::feed::FeedError;

/// Record separator.
pub const SEPARATOR: u8 = b'\n';

/// Read-only mapping over an entire source file.
///
/// The mapping is released exactly once when the value is dropped. If
/// `open` fails partway, whatever was acquired (the file handle) is
/// released by its own drop on the early return.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    map: Mmap,
    // Held for the lifetime of the mapping.
    _file: File,
}

impl MappedFile {
    /// Opens `path`, stats it, and maps the whole file read-only.
    pub fn open(path: &Path) -> Result<Self, FeedError> {
        let file = File::open(path).map_err(|err| FeedError::io(path, err))?;
        let meta = file.metadata().map_err(|err| FeedError::io(path, err))?;
        if meta.len() == 0 {
            return Err(FeedError::io_detail(path, "zero size"));
        }

        // SAFETY: wordlists are treated as immutable for the lifetime of a
        // job. Truncating the file underneath a live mapping is outside the
        // contract, same as for any other mmap-based reader.
        let map = unsafe { Mmap::map(&file) }.map_err(|err| FeedError::Io {
            path: path.to_path_buf(),
            detail: format!("mmap failed: {err}"),
            source: Some(err),
        })?;
        advise_sequential(&file, &map);

        Ok(Self {
            path: path.to_path_buf(),
            map,
            _file: file,
        })
    }

    /// Returns the mapped bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Always false; empty files are rejected by `open`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Splits off the record starting at `off`.
///
/// Returns the record bytes (separator excluded, `\r` kept) and the offset
/// of the following record, or `None` when `off` is at or past the end.
#[inline]
#[must_use]
pub fn next_record(bytes: &[u8], off: usize) -> Option<(&[u8], usize)> {
    if off >= bytes.len() {
        return None;
    }
    let rest = &bytes[off..];
    match memchr::memchr(SEPARATOR, rest) {
        Some(pos) => Some((&rest[..pos], off + pos + 1)),
        // No separator: the remainder is the final record.
        None => Some((rest, bytes.len())),
    }
}

/// Advances `count` records from `off`.
///
/// Returns the new offset, or `Err(skipped)` with the number of records
/// that were available when end-of-file was reached first.
pub fn skip_records(bytes: &[u8], mut off: usize, count: u64) -> Result<usize, u64> {
    let mut skipped = 0u64;
    while skipped < count {
        match next_record(bytes, off) {
            Some((_, next)) => {
                off = next;
                skipped += 1;
            }
            None => return Err(skipped),
        }
    }
    Ok(off)
}

/// Copies a record into `out`, stripping trailing `\r` and truncating to
/// `out.len()`. Returns the number of bytes written.
#[inline]
pub fn copy_candidate(record: &[u8], out: &mut [u8]) -> usize {
    let mut len = record.len();
    while len > 0 && record[len - 1] == b'\r' {
        len -= 1;
    }
    let len = len.min(out.len());
    out[..len].copy_from_slice(&record[..len]);
    len
}

/// Counts records in `bytes` the same way [`next_record`] splits them.
#[must_use]
pub fn count_records(bytes: &[u8]) -> u64 {
    let separators = memchr::memchr_iter(SEPARATOR, bytes).count() as u64;
    match bytes.last() {
        Some(&SEPARATOR) | None => separators,
        Some(_) => separators + 1,
    }
}

/// Hints the OS that the mapping will be read front to back.
///
/// Advisory only; failures are ignored.
#[cfg(unix)]
fn advise_sequential(file: &File, map: &Mmap) {
    // SAFETY: the descriptor is open for the duration of `fadvise` and the
    // mapping pointer/length describe a live mapping for `madvise`.
    unsafe {
        #[cfg(target_os = "linux")]
        let _ = libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
        #[cfg(not(target_os = "linux"))]
        let _ = file;
        let _ = libc::madvise(
            map.as_ptr() as *mut libc::c_void,
            map.len(),
            libc::MADV_SEQUENTIAL,
        );
    }
}

#[cfg(not(unix))]
fn advise_sequential(_file: &File, _map: &Mmap) {}
