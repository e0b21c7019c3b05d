//! Crate-wide error types.
//!
//! Each component gets its own error enum, in the style of
//! [`crate::config::ConfigError`], rather than a single catch-all. Only
//! domain-specific failures are represented here; programming errors are
//! allowed to panic per the library's error-handling contract.

use std::fmt;
use std::path::PathBuf;

/// Storage-layer failure. Always recoverable by retry or reopening the
/// database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// The database handle was used after `close()`.
    Closed,
    /// `verify_integrity` found corruption.
    IntegrityCheckFailed(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "database error: {e}"),
            Self::Io(e) => write!(f, "database io error: {e}"),
            Self::Closed => write!(f, "database is closed"),
            Self::IntegrityCheckFailed(msg) => write!(f, "integrity check failed: {msg}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Indexing failure. Individual unreadable files are logged and skipped
/// rather than surfaced here; this covers failures of the scan itself.
#[derive(Debug)]
pub enum IndexError {
    Db(DbError),
    Io(std::io::Error),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Db(e) => write!(f, "indexing database error: {e}"),
            Self::Io(e) => write!(f, "indexing io error: {e}"),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<DbError> for IndexError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Palette extraction failure. Per spec.md §7, callers treat any of these
/// as "no palette available" and apply the 0.8 color-affinity penalty;
/// this type exists for logging, not for control flow.
#[derive(Debug)]
pub enum ExtractError {
    AnalyzerMissing,
    AnalyzerTimedOut,
    AnalyzerExitedWithFailure(i32),
    CacheFileNotFound { image_hash: String },
    CacheStale,
    MalformedCache(PathBuf, String),
    Io(std::io::Error),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnalyzerMissing => write!(f, "palette analyzer binary not found"),
            Self::AnalyzerTimedOut => write!(f, "palette analyzer timed out"),
            Self::AnalyzerExitedWithFailure(code) => {
                write!(f, "palette analyzer exited with status {code}")
            }
            Self::CacheFileNotFound { image_hash } => {
                write!(f, "no cache file found for image hash {image_hash}")
            }
            Self::CacheStale => write!(f, "cache file predates this extraction"),
            Self::MalformedCache(path, msg) => {
                write!(f, "malformed cache file {}: {msg}", path.display())
            }
            Self::Io(e) => write!(f, "extraction io error: {e}"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Theming engine failure. Per spec.md §7 most of these are logged and
/// swallowed at the call site; this type exists so callers that do want
/// to observe a failure (tests, the CLI) can.
#[derive(Debug)]
pub enum ThemeError {
    Io(std::io::Error),
    TemplateParse { path: PathBuf, message: String },
    OverlayParse(String),
    ReloadCommandFailed { name: String, message: String },
}

impl fmt::Display for ThemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "theming io error: {e}"),
            Self::TemplateParse { path, message } => {
                write!(f, "failed to parse template {}: {message}", path.display())
            }
            Self::OverlayParse(msg) => write!(f, "failed to parse theming overlay: {msg}"),
            Self::ReloadCommandFailed { name, message } => {
                write!(f, "reload command '{name}' failed: {message}")
            }
        }
    }
}

impl std::error::Error for ThemeError {}

impl From<std::io::Error> for ThemeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Top-level error composing every component's error, for the CLI layer.
#[derive(Debug)]
pub enum CoreError {
    Db(DbError),
    Index(IndexError),
    Extract(ExtractError),
    Theme(ThemeError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Db(e) => write!(f, "{e}"),
            Self::Index(e) => write!(f, "{e}"),
            Self::Extract(e) => write!(f, "{e}"),
            Self::Theme(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<DbError> for CoreError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

impl From<IndexError> for CoreError {
    fn from(e: IndexError) -> Self {
        Self::Index(e)
    }
}

impl From<ExtractError> for CoreError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

impl From<ThemeError> for CoreError {
    fn from(e: ThemeError) -> Self {
        Self::Theme(e)
    }
}
