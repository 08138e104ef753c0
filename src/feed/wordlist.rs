//! Memory-mapped wordlist feed.
//!
//! # Scope
//! Streams newline-separated candidates from a file. Each device maps the
//! whole file once and walks it with its own cursor; nothing is copied
//! except the bounded candidate handed to the caller.
//!
//! # Keyspace
//! The first `keyspace` call tries the persisted seek index (cheap path,
//! `cache_hit` event). On a miss it maps the file, builds the index with one
//! full pass, persists it, and emits `cache_generate` with the build time.
//!
//! # Seeking
//! With an index, a seek jumps to the sampled offset at or before the
//! target and walks the remaining `< step` lines. If the cursor already
//! sits between that sample and the target, it walks from where it is.
//! Without an index (keyspace never queried, or the file changed size
//! since the index was built) the walk starts at the cursor, or at line 0
//! for a backward target.

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{FeedConfig, FeedCursor, FeedError, FeedSource, PW_MAX};
use crate::events::{
    CacheGenerateEvent, CacheHitEvent, DiagnosticEvent, EventSink, FeedEvent,
};
use crate::mapped::{self, MappedFile};
use crate::seekdb::{SeekDbCache, SeekIndex};

/// Minimum `workv` length: plugin name plus the wordlist path.
const MIN_WORKC: usize = 2;

/// `global_init` entry for [`super::WORDLIST_FEED`].
pub fn global_init(config: &FeedConfig) -> Result<Box<dyn FeedSource>, FeedError> {
    Ok(Box::new(WordlistFeed::new(config)?))
}

/// Global context of the wordlist feed.
#[derive(Debug)]
pub struct WordlistFeed {
    path: PathBuf,
    cache: SeekDbCache,
    step: u64,
    index: Option<SeekIndex>,
}

impl WordlistFeed {
    /// Validates arguments and resolves the wordlist path. Touches nothing
    /// on disk beyond path canonicalization.
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        if config.workv.len() < MIN_WORKC {
            return Err(FeedError::config(format!(
                "Invalid parameter count: {}. Count must be at least {MIN_WORKC}.",
                config.workv.len()
            )));
        }

        Ok(Self {
            path: resolve_source_path(Path::new(&config.workv[1])),
            cache: config.seekdb_cache(),
            step: config.seek_step,
            index: None,
        })
    }

    /// Absolute path of the wordlist.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The seek index, once `keyspace` has run.
    #[must_use]
    pub fn index(&self) -> Option<&SeekIndex> {
        self.index.as_ref()
    }

    fn build_index(&self, events: &dyn EventSink) -> Result<SeekIndex, FeedError> {
        let source = MappedFile::open(&self.path)?;

        let start = Instant::now();
        let index = SeekIndex::build(source.as_bytes(), self.step);
        let elapsed = start.elapsed();
        drop(source);

        let stored = self.cache.try_store(&self.path, &index);

        let secs = elapsed.as_secs_f64();
        let throughput_mib_s = if secs > 0.0 {
            index.file_size() as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        };
        events.emit(FeedEvent::CacheGenerate(CacheGenerateEvent {
            path: &self.path,
            file_size: index.file_size(),
            line_count: index.line_count(),
            entries: index.entries().len() as u64,
            elapsed_ms: elapsed.as_millis() as u64,
            throughput_mib_s,
        }));
        if self.cache.is_enabled() && !stored {
            events.emit(FeedEvent::Diagnostic(DiagnosticEvent {
                level: "warn",
                message: "seek index built but not persisted; next run rebuilds it",
            }));
        }
        Ok(index)
    }
}

impl FeedSource for WordlistFeed {
    fn keyspace(&mut self, events: &dyn EventSink) -> Result<u64, FeedError> {
        if let Some(index) = &self.index {
            return Ok(index.line_count());
        }

        let live_size = std::fs::metadata(&self.path)
            .map_err(|err| FeedError::io(&self.path, err))?
            .len();

        let index = match self.cache.try_load(&self.path, live_size, self.step) {
            Ok(index) => {
                events.emit(FeedEvent::CacheHit(CacheHitEvent {
                    path: &self.path,
                    file_size: index.file_size(),
                    cached_count: index.line_count(),
                    keyspace: index.line_count(),
                }));
                index
            }
            Err(miss) => {
                tracing::debug!(path = %self.path.display(), %miss, "seekdb cache miss");
                self.build_index(events)?
            }
        };

        let lines = index.line_count();
        self.index = Some(index);
        Ok(lines)
    }

    fn open_cursor(&self, device: usize) -> Result<Box<dyn FeedCursor + '_>, FeedError> {
        Ok(Box::new(WordlistCursor::open(self, device)?))
    }
}

/// Per-device context: one mapping and one cursor.
#[derive(Debug)]
pub struct WordlistCursor<'a> {
    feed: &'a WordlistFeed,
    source: MappedFile,
    /// The feed's index, or `None` when it was built for a different size.
    index: Option<&'a SeekIndex>,
    device: usize,
    /// Byte offset of the next record; always `<= source.len()`.
    off: usize,
    /// Logical line of the next record.
    line: u64,
}

impl<'a> WordlistCursor<'a> {
    /// Opens and maps the wordlist for `device`.
    ///
    /// If the mapped size no longer matches the seek index, the index is
    /// ignored and seeks scan from the cursor.
    pub fn open(feed: &'a WordlistFeed, device: usize) -> Result<Self, FeedError> {
        let source = MappedFile::open(&feed.path)?;
        let index = feed.index.as_ref().filter(|index| {
            let fresh = index.file_size() == source.len() as u64;
            if !fresh {
                tracing::debug!(
                    device,
                    indexed = index.file_size(),
                    mapped = source.len(),
                    "wordlist size differs from its seek index; seeking by scan"
                );
            }
            fresh
        });
        Ok(Self {
            feed,
            source,
            index,
            device,
            off: 0,
            line: 0,
        })
    }

    #[must_use]
    pub fn device(&self) -> usize {
        self.device
    }

    /// Byte offset of the next record.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.off
    }
}

impl FeedCursor for WordlistCursor<'_> {
    fn next(&mut self, out: &mut [u8; PW_MAX]) -> Result<usize, FeedError> {
        let Some((record, next)) = mapped::next_record(self.source.as_bytes(), self.off) else {
            return Err(FeedError::EndOfInput);
        };
        let len = mapped::copy_candidate(record, out);
        self.off = next;
        self.line += 1;
        Ok(len)
    }

    fn seek(&mut self, target: u64) -> Result<(), FeedError> {
        let bytes = self.source.as_bytes();
        let index = self.index;

        if let Some(index) = index {
            if target >= index.line_count() {
                return Err(FeedError::range(format!(
                    "seek target past EOF: {target} (keyspace {})",
                    index.line_count()
                )));
            }
        }

        match index.and_then(|index| index.lookup(target)) {
            // Walking forward from the cursor is no longer than from the sample.
            Some((line, _)) if line <= self.line && self.line <= target => {}
            Some((line, off)) => {
                let off = usize::try_from(off)
                    .ok()
                    .filter(|&off| off <= bytes.len())
                    .ok_or_else(|| {
                        FeedError::range(format!(
                            "seek index offset {off} past end of {}",
                            self.feed.path.display()
                        ))
                    })?;
                self.off = off;
                self.line = line;
            }
            None if target < self.line => {
                self.off = 0;
                self.line = 0;
            }
            None => {}
        }

        match mapped::skip_records(bytes, self.off, target - self.line) {
            Ok(off) => {
                self.off = off;
                self.line = target;
                Ok(())
            }
            Err(skipped) => {
                self.off = bytes.len();
                self.line += skipped;
                Err(FeedError::range(format!(
                    "seek past EOF: target {target}, file ends at line {}",
                    self.line
                )))
            }
        }
    }

    fn line(&self) -> u64 {
        self.line
    }
}

/// Absolute form of `path`, canonicalized when it exists.
fn resolve_source_path(path: &Path) -> PathBuf {
    if let Ok(abs) = std::fs::canonicalize(path) {
        return abs;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
