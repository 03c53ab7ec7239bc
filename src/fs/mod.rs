//! Filesystem manipulation operations.
//!
//! Every backend implements [`FileSystem`], so callers can hold a
//! `Box<dyn FileSystem>` and stay unaware of the transport behind it.
//! Paths are passed to the backend as they are given.

mod local;

use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::{error::Result, file::FileInfo};

pub use local::LocalFileSystem;

/// Readable byte stream handed to [`FileSystem::put`] and returned by [`FileSystem::get`].
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Operations supported by every storage backend.
///
/// The methods go through `#[async_trait]` and return boxed futures, which
/// keeps the trait usable as `dyn FileSystem`.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Lists the entries of a directory, in the order the backend returns them.
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>>;

    /// Writes the whole stream to `to_path`, replacing any existing file.
    ///
    /// Returns once every byte has been handed to the backend.
    async fn put(&self, src: ByteStream, to_path: &str) -> Result<()>;

    /// Opens a file for reading.
    async fn get(&self, path: &str) -> Result<ByteStream>;

    /// Creates a directory, and its missing parents when `recursive` is set.
    /// A recursive call on an existing directory succeeds.
    async fn mkdir(&self, path: &str, recursive: bool) -> Result<()>;

    /// Removes a directory. With `recursive` its content is removed first.
    async fn rmdir(&self, path: &str, recursive: bool) -> Result<()>;

    /// Removes a file.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Renames or moves a file or directory.
    ///
    /// `rename("/a/x", "/a/y")` renames, `rename("/a/x", "/b/x")` moves and
    /// `rename("/a/x", "/b/y")` does both.
    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()>;

    /// Releases the session held by the backend. Calling it again is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
