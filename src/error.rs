//! Error types returned by the store.

use std::fmt;

/// A specialized `Result` type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`crate::Store`] operations.
#[derive(Debug)]
pub enum Error {
    /// `get` or `delete` was called on a key that is absent from the keydir.
    NotFound(String),
    /// A caller-supplied argument violates a format invariant (e.g. an
    /// empty value, or a key that isn't valid UTF-8).
    InvalidArgument(String),
    /// A filesystem operation failed.
    Io(std::io::Error),
    /// A record's header decoded but its key or value bytes could not be
    /// read in full (the file was truncated after a successful header).
    Corruption(String),
    /// The directory is already held open by this process.
    AlreadyOpen(std::path::PathBuf),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(key) => write!(f, "key not found: {key}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::Corruption(msg) => write!(f, "data corruption: {msg}"),
            Error::AlreadyOpen(path) => {
                write!(f, "store directory already open: {}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}
