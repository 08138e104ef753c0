//! Startup configuration handed to a feed's `global_init`.
//!
//! `workv` mirrors the plugin argument vector: `workv[0]` is the plugin
//! name and `workv[1..]` are its positional arguments. Everything else has
//! a default and can be overridden from the environment.
//!
//! # Environment controls
//!
//! - `WORDFEED_SEEKDB_CACHE=0|false|off|no` disables the persisted seek index.
//! - `WORDFEED_SEEKDB_DIR=/path` overrides the cache directory.
//! - Default directory: `$HOME/.cache/wordfeed/seekdb`, fallback
//!   `$TMPDIR/wordfeed-seekdb`.

use std::path::PathBuf;

use super::FeedError;
use crate::seekdb::{SeekDbCache, SEEKDB_STEP};

const ENV_CACHE: &str = "WORDFEED_SEEKDB_CACHE";
const ENV_CACHE_DIR: &str = "WORDFEED_SEEKDB_DIR";

/// Feed startup configuration.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Plugin argument vector; `workv[0]` is the plugin name.
    pub workv: Vec<String>,
    /// Suppress cache hit/generate events.
    pub quiet: bool,
    /// Seek index cache directory. `None` resolves to the default location.
    pub cache_dir: Option<PathBuf>,
    /// Persist and reuse seek indexes.
    pub cache_enabled: bool,
    /// Seek index sampling interval in lines.
    pub seek_step: u64,
}

impl FeedConfig {
    /// Configuration with defaults and no environment lookups.
    pub fn new<I, S>(workv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            workv: workv.into_iter().map(Into::into).collect(),
            quiet: false,
            cache_dir: None,
            cache_enabled: true,
            seek_step: SEEKDB_STEP,
        }
    }

    /// Configuration with `WORDFEED_SEEKDB_*` overrides applied.
    pub fn from_env<I, S>(workv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::new(workv);
        if let Ok(v) = std::env::var(ENV_CACHE) {
            config.cache_enabled = !is_off(&v);
        }
        if let Some(dir) = std::env::var_os(ENV_CACHE_DIR) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        config
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_seek_step(mut self, step: u64) -> Self {
        self.seek_step = step;
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Checks values that do not depend on the plugin.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.seek_step == 0 {
            return Err(FeedError::config("seek step must be at least 1"));
        }
        Ok(())
    }

    /// Builds the seek index cache handle for this configuration.
    #[must_use]
    pub fn seekdb_cache(&self) -> SeekDbCache {
        if !self.cache_enabled {
            return SeekDbCache::disabled();
        }
        let dir = self.cache_dir.clone().unwrap_or_else(default_cache_dir);
        SeekDbCache::new(Some(dir))
    }
}

fn is_off(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    v == "0" || v == "false" || v == "off" || v == "no"
}

/// `$HOME/.cache/wordfeed/seekdb`, falling back to the temp directory.
fn default_cache_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".cache")
            .join("wordfeed")
            .join("seekdb");
    }
    std::env::temp_dir().join("wordfeed-seekdb")
}
