use std::{fmt, io};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T> = std::result::Result<T, Error>;

/// Storage backend that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Ftp,
    Sftp,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Ftp => "ftp",
            Self::Sftp => "sftp",
        })
    }
}

/// Operation being performed, used to disambiguate native error codes
/// that mean different things depending on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    List,
    Put,
    Get,
    Mkdir,
    Rmdir,
    Delete,
    Rename,
    Close,
}

/// Enum for file system errors, shared by every backend
#[derive(Debug, Error)]
pub enum Error {
    /// The remote session could not be established or is no longer available
    #[error("Connection: {0}")]
    Connection(String),
    /// The path does not exist
    #[error("No such file or directory: {0}")]
    NotFound(String),
    /// `mkdir` without `recursive` on a path that already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// `rmdir` without `recursive` on a directory that still has entries
    #[error("Directory not empty: {0}")]
    NotEmpty(String),
    /// Any other failure reported by the backend, with the native error attached
    #[error("{backend} backend failed on {path}: {source}")]
    Backend {
        backend: Backend,
        path: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn backend<E>(backend: Backend, path: &str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Backend {
            backend,
            path: path.to_owned(),
            source: source.into(),
        }
    }

    /// Translates an I/O error from the local file system.
    pub(crate) fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_owned()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_owned()),
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty(path.to_owned()),
            _ => Self::backend(Backend::Local, path, err),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
