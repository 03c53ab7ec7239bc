//! One async file system interface over local disk, FTP and SFTP.
//!
//! ```no_run
//! use unifs::{BackendConfig, FileSystem, RemoteConfig};
//!
//! # async fn run() -> unifs::Result<()> {
//! let config = BackendConfig::Sftp(RemoteConfig {
//!     host: "localhost".to_owned(),
//!     port: None,
//!     user: "root".to_owned(),
//!     password: "pass".to_owned(),
//! });
//!
//! let fs = unifs::connect(&config).await?;
//! for entry in fs.list("/srv").await? {
//!     println!("{} {}", entry.name(), entry.is_dir());
//! }
//! fs.close().await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

mod config;
mod error;
mod file;
/// Backend-independent interface and the local backend
pub mod fs;
/// FTP backend
pub mod ftp;
/// SFTP backend
pub mod sftp;
mod utils;

pub use config::{connect, BackendConfig, RemoteConfig};
pub use error::{Backend, BoxError, Error, Result};
pub use file::{FileInfo, FileKind};
pub use fs::{ByteStream, FileSystem, LocalFileSystem};
pub use ftp::FtpFileSystem;
pub use sftp::SftpFileSystem;
