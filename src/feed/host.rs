//! Device-indexed feed lifecycle driven by the compute engine.
//!
//! # Lifecycle
//!
//! ```text
//! global_init ─► global_keyspace (0..n) ─► thread_init(dev) ─┐
//!                                                            ├─ next / seek (per device, own thread)
//!                                            thread_term(dev) ◄┘
//!                                         ─► global_term
//! ```
//!
//! [`DeviceFeed`] borrows the host, so `global_term(self)` cannot run while
//! any device is still live, and `global_keyspace(&mut self)` cannot run
//! while devices read the index.
//!
//! # Error reporting
//!
//! Every failure except `EndOfInput` sets the host's sticky error flag and
//! replaces its message, truncated to [`ERROR_MSG_MAX`] bytes. The error is
//! also returned to the caller; the host never retries.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{
    FeedConfig, FeedCursor, FeedError, FeedPlugin, FeedSource, FEED_PLUGIN_VERSION, PW_MAX,
};
use crate::events::{EventSink, NullEventSink};

/// Maximum length in bytes of the recorded error message.
pub const ERROR_MSG_MAX: usize = 256;

/// Job-wide state shared (read-only, apart from the error slot) with every
/// device.
#[derive(Debug)]
pub struct GlobalContext {
    workv: Vec<String>,
    quiet: bool,
    cache_dir: Option<PathBuf>,
    error: Mutex<Option<String>>,
}

impl GlobalContext {
    fn new(config: &FeedConfig) -> Self {
        Self {
            workv: config.workv.clone(),
            quiet: config.quiet,
            cache_dir: config.seekdb_cache().dir().map(Path::to_path_buf),
            error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn workv(&self) -> &[String] {
        &self.workv
    }

    #[must_use]
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Seek index cache directory in effect, `None` when caching is off.
    #[must_use]
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// True once any operation has failed.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Message of the most recent failure.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, err: &FeedError) {
        if err.is_end_of_input() {
            return;
        }
        let msg = bounded_message(&err.to_string());
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(msg);
    }
}

/// Truncates `msg` to at most [`ERROR_MSG_MAX`] bytes on a char boundary.
fn bounded_message(msg: &str) -> String {
    if msg.len() <= ERROR_MSG_MAX {
        return msg.to_owned();
    }
    let mut end = ERROR_MSG_MAX;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    msg[..end].to_owned()
}

/// One job's feed: the plugin's global context plus error and event plumbing.
pub struct FeedHost {
    plugin: FeedPlugin,
    ctx: GlobalContext,
    source: Box<dyn FeedSource>,
    events: Arc<dyn EventSink>,
    keyspace: Option<u64>,
}

impl FeedHost {
    /// Creates the global context for `plugin`.
    pub fn global_init(
        plugin: &FeedPlugin,
        config: FeedConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, FeedError> {
        if plugin.version != FEED_PLUGIN_VERSION {
            return Err(FeedError::Version {
                got: plugin.version,
                expected: FEED_PLUGIN_VERSION,
            });
        }
        let source = (plugin.global_init)(&config)?;
        let events: Arc<dyn EventSink> = if config.quiet {
            Arc::new(NullEventSink)
        } else {
            events
        };
        Ok(Self {
            plugin: *plugin,
            ctx: GlobalContext::new(&config),
            source,
            events,
            keyspace: None,
        })
    }

    #[must_use]
    pub fn plugin(&self) -> &FeedPlugin {
        &self.plugin
    }

    #[must_use]
    pub fn context(&self) -> &GlobalContext {
        &self.ctx
    }

    /// Total candidate count. The first call may build the seek index.
    pub fn global_keyspace(&mut self) -> Result<u64, FeedError> {
        if let Some(keyspace) = self.keyspace {
            return Ok(keyspace);
        }
        match self.source.keyspace(self.events.as_ref()) {
            Ok(keyspace) => {
                self.keyspace = Some(keyspace);
                Ok(keyspace)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Creates the context for `device`.
    pub fn thread_init(&self, device: usize) -> Result<DeviceFeed<'_>, FeedError> {
        let cursor = self
            .source
            .open_cursor(device)
            .map_err(|err| self.fail(err))?;
        Ok(DeviceFeed {
            device,
            ctx: &self.ctx,
            cursor,
        })
    }

    /// Releases the global context. Every [`DeviceFeed`] must be gone.
    pub fn global_term(self) {
        self.events.flush();
    }

    fn fail(&self, err: FeedError) -> FeedError {
        self.ctx.record(&err);
        err
    }
}

/// One device's live feed context.
///
/// Dropping it is `thread_term`: the mapping and file handle are released
/// exactly once.
pub struct DeviceFeed<'h> {
    device: usize,
    ctx: &'h GlobalContext,
    cursor: Box<dyn FeedCursor + 'h>,
}

impl DeviceFeed<'_> {
    #[must_use]
    pub fn device(&self) -> usize {
        self.device
    }

    /// Logical line the next call to `next` yields.
    #[must_use]
    pub fn line(&self) -> u64 {
        self.cursor.line()
    }

    /// Writes the next candidate into `out` and returns its length.
    pub fn next(&mut self, out: &mut [u8; PW_MAX]) -> Result<usize, FeedError> {
        self.cursor.next(out).map_err(|err| {
            self.ctx.record(&err);
            err
        })
    }

    /// Moves to logical line `line`.
    pub fn seek(&mut self, line: u64) -> Result<(), FeedError> {
        self.cursor.seek(line).map_err(|err| {
            self.ctx.record(&err);
            err
        })
    }

    /// Tears the device down.
    pub fn term(self) {}
}

impl std::fmt::Debug for DeviceFeed<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFeed")
            .field("device", &self.device)
            .field("line", &self.cursor.line())
            .finish_non_exhaustive()
    }
}
