use std::fmt;

use samara_core::FsError;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the stream layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed on a shard, the sidecar index, or an
    /// archive file
    Io(std::io::Error),

    /// Advisory lock wait exceeded the bounded limit
    LockTimeout { path: String, waited_secs: u64 },

    /// A caller-provided deadline expired during a state-mutating
    /// operation
    Timeout { operation: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "Stream IO error: {}", err),
            Error::LockTimeout { path, waited_secs } => {
                write!(f, "Stream lock timeout after {}s on {}", waited_secs, path)
            }
            Error::Timeout { operation } => {
                write!(f, "Stream operation timed out: {}", operation)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::LockTimeout { .. } | Error::Timeout { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<FsError> for Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(err) => Error::Io(err),
            FsError::LockTimeout { path, waited } => Error::LockTimeout {
                path,
                waited_secs: waited.as_secs(),
            },
        }
    }
}
