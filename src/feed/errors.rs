//! Error taxonomy for feed plugins.
//!
//! Four failure classes cross the plugin boundary:
//! - `Config` / `Version`: bad startup arguments or an incompatible plugin.
//!   Fatal to the job.
//! - `Io`: open/stat/map failures. Fatal to the device that hit them; the
//!   underlying OS error is kept as the `source`.
//! - `Range`: a seek target past the known end, or an index that disagrees
//!   with the file it claims to describe. Fatal to the current operation;
//!   the caller may retry with a valid offset or restart the device.
//! - `EndOfInput`: the normal end of a device's stream. Not a failure, and
//!   never recorded in the host's sticky error slot.
//!
//! Nothing in this crate retries. Retry policy belongs to the engine.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Coarse classification of a [`FeedError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedErrorKind {
    Config,
    Io,
    Range,
    EndOfInput,
}

/// Errors returned by feed sources, cursors, and the host.
#[derive(Debug)]
#[non_exhaustive]
pub enum FeedError {
    /// Missing or malformed startup arguments.
    Config { detail: String },
    /// Plugin descriptor reports a contract version the host does not speak.
    Version { got: u32, expected: u32 },
    /// Open, stat, or map failure on the source file.
    Io {
        path: PathBuf,
        detail: String,
        source: Option<io::Error>,
    },
    /// Seek target out of range, or index/file inconsistency found mid-seek.
    Range { detail: String },
    /// The cursor already reached end-of-file.
    EndOfInput,
}

impl FeedError {
    /// Creates a configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Creates an I/O error that keeps the OS error as its source.
    pub fn io(path: &Path, err: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            detail: err.to_string(),
            source: Some(err),
        }
    }

    /// Creates an I/O error without an OS cause (e.g. a zero-size file).
    pub fn io_detail(path: &Path, detail: impl Into<String>) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            detail: detail.into(),
            source: None,
        }
    }

    /// Creates a range error.
    pub fn range(detail: impl Into<String>) -> Self {
        Self::Range {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FeedErrorKind {
        match self {
            Self::Config { .. } | Self::Version { .. } => FeedErrorKind::Config,
            Self::Io { .. } => FeedErrorKind::Io,
            Self::Range { .. } => FeedErrorKind::Range,
            Self::EndOfInput => FeedErrorKind::EndOfInput,
        }
    }

    /// Returns true for the non-fatal exhaustion signal.
    #[must_use]
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Self::EndOfInput)
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { detail } => f.write_str(detail),
            Self::Version { got, expected } => write!(
                f,
                "plugin version mismatch: got {got}, expected {expected}"
            ),
            Self::Io { path, detail, .. } => write!(f, "{}: {detail}", path.display()),
            Self::Range { detail } => f.write_str(detail),
            Self::EndOfInput => f.write_str("end of input"),
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io {
                source: Some(err), ..
            } => Some(err),
            _ => None,
        }
    }
}
