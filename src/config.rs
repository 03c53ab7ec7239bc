use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    error::Result,
    fs::{FileSystem, LocalFileSystem},
    ftp::{self, FtpFileSystem},
    sftp::{self, SftpFileSystem},
};

/// Connection parameters of a remote backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    /// Falls back to the protocol's well-known port when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

/// Description of a backend, e.g. `{"type": "sftp", "host": "...", "user": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Local,
    Ftp(RemoteConfig),
    Sftp(RemoteConfig),
}

impl BackendConfig {
    /// Port that [`connect`] will use, `None` for the local backend.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Local => None,
            Self::Ftp(remote) => Some(remote.port.unwrap_or(ftp::DEFAULT_PORT)),
            Self::Sftp(remote) => Some(remote.port.unwrap_or(sftp::DEFAULT_PORT)),
        }
    }
}

/// Builds the backend described by `config`, connecting remote ones.
pub async fn connect(config: &BackendConfig) -> Result<Box<dyn FileSystem>> {
    let port = config.port().unwrap_or_default();

    Ok(match config {
        BackendConfig::Local => Box::new(LocalFileSystem::create().await?),
        BackendConfig::Ftp(remote) => Box::new(
            FtpFileSystem::create(&remote.host, port, &remote.user, &remote.password).await?,
        ),
        BackendConfig::Sftp(remote) => Box::new(
            SftpFileSystem::create(&remote.host, port, &remote.user, &remote.password).await?,
        ),
    })
}
