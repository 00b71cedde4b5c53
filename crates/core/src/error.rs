//! Unified error types for the time machine.
//!
//! Every variant renders with a stable code prefix so crawl logs can be
//! grepped for the failure class regardless of the message.

use std::path::PathBuf;

use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Unified error type for snapshot sessions, stores and codecs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session cannot run with the given configuration. Fatal to the crawl.
    #[error("CONFIGURATION_ERROR: {0}")]
    Configuration(String),

    /// The time machine is switched off for this crawl.
    #[error("NOT_CONFIGURED: {0}")]
    NotConfigured(String),

    /// A remote location did not decompose into `scheme://bucket/path`.
    #[error("INVALID_LOCATION: {0}")]
    InvalidLocation(String),

    /// The backing store file could not be opened or prepared.
    #[error("STORAGE_OPEN_ERROR: {path}: {reason}")]
    StorageOpen { path: PathBuf, reason: String },

    /// A record blob was truncated, corrupt or of an unknown format.
    #[error("CODEC_ERROR: {0}")]
    Codec(String),

    /// Upload or download of a snapshot blob failed.
    #[error("REMOTE_SYNC_ERROR: {0}")]
    RemoteSync(String),

    /// A replay-only crawl issued a request that was never recorded.
    #[error("UNKNOWN_REQUEST: {0}")]
    UnknownRequest(String),

    /// The session or store was used outside its open lifetime.
    #[error("SESSION_CLOSED: {0}")]
    SessionClosed(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Filesystem operation failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the owning crawl must abort instead of carrying on without a cache.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Codec(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}
