//! Error types for the file sink

use std::io;
use std::path::PathBuf;

/// Result type for file sink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the file sink
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with static context
    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),

    /// Failed to create the log directory
    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The path that failed to be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to rotate a log file
    #[error("failed to rotate log file: {0}")]
    Rotation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The registry was closed by shutdown; no further writes are accepted
    #[error("sink is closed")]
    Closed,

    /// The destination for this key has no usable handle; the record was
    /// dropped
    #[error("log writer for `{0}` has no usable handle")]
    Unusable(String),

    /// A record source is already attached
    #[error("record source already attached")]
    SourceAlreadyAttached,

    /// The maintenance service was already started
    #[error("maintenance service already started")]
    AlreadyStarted,
}
