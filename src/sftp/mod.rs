//! SFTP backend over an SSH session.

mod error;
mod handler;

use futures::future::BoxFuture;
use russh::{client, Disconnect};
use russh_sftp::{
    client::{fs::DirEntry, SftpSession},
    protocol::FileType,
};
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    io::{self, AsyncWriteExt},
    runtime::Handle,
    sync::Mutex,
};

use self::{
    error::{classify, is_no_such_file},
    handler::Client,
};
use crate::{
    error::{Backend, Error, Op, Result},
    file::{FileInfo, FileKind, DIR_TAG, FILE_TAG, SYMLINK_TAG},
    fs::{ByteStream, FileSystem},
    utils,
};

pub const DEFAULT_PORT: u16 = 22;

fn type_tag(file_type: FileType) -> char {
    if file_type.is_dir() {
        DIR_TAG
    } else if file_type.is_symlink() {
        SYMLINK_TAG
    } else if file_type.is_file() {
        FILE_TAG
    } else {
        '?'
    }
}

impl From<DirEntry> for FileInfo {
    fn from(entry: DirEntry) -> Self {
        let tag = type_tag(entry.file_type());
        FileInfo::new(entry.file_name(), entry.metadata().size, FileKind::from_tag(tag))
    }
}

/// [`FileSystem`] over an SFTP channel.
///
/// The SSH session and the `sftp` subsystem channel are opened by
/// [`SftpFileSystem::create`] and kept until [`FileSystem::close`] or drop.
pub struct SftpFileSystem {
    addr: String,
    sftp: SftpSession,
    ssh: Mutex<Option<client::Handle<Client>>>,
    closed: AtomicBool,
}

impl SftpFileSystem {
    /// Connects, authenticates with `user`/`password` and starts the SFTP subsystem.
    pub async fn create(host: &str, port: u16, user: &str, password: &str) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("connecting to sftp://{user}@{addr}");

        let config = Arc::new(client::Config::default());
        let mut ssh = client::connect(config, (host, port), Client::new(host))
            .await
            .map_err(|e| connection(&addr, e))?;

        let authenticated = ssh
            .authenticate_password(user, password)
            .await
            .map_err(|e| connection(&addr, e))?;
        if !authenticated {
            return Err(Error::Connection(format!(
                "{addr}: authentication rejected for {user}"
            )));
        }

        let channel = ssh
            .channel_open_session()
            .await
            .map_err(|e| connection(&addr, e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| connection(&addr, e))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| connection(&addr, e))?;

        debug!("sftp session ready on {addr}");

        Ok(Self {
            addr,
            sftp,
            ssh: Mutex::new(Some(ssh)),
            closed: AtomicBool::new(false),
        })
    }

    fn session(&self) -> Result<&SftpSession> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Connection(format!("{}: session closed", self.addr)));
        }
        Ok(&self.sftp)
    }
}

fn connection(addr: &str, err: impl Display) -> Error {
    Error::Connection(format!("{addr}: {err}"))
}

#[async_trait]
impl FileSystem for SftpFileSystem {
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let entries = self
            .session()?
            .read_dir(path)
            .await
            .map_err(|e| classify(e, Op::List, path))?;

        Ok(entries.map(FileInfo::from).collect())
    }

    async fn put(&self, mut src: ByteStream, to_path: &str) -> Result<()> {
        let mut file = self
            .session()?
            .create(to_path)
            .await
            .map_err(|e| classify(e, Op::Put, to_path))?;

        let written = io::copy(&mut src, &mut file)
            .await
            .map_err(|e| Error::backend(Backend::Sftp, to_path, e))?;
        file.shutdown()
            .await
            .map_err(|e| Error::backend(Backend::Sftp, to_path, e))?;

        trace!("wrote {written} bytes to {to_path}");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        let file = self
            .session()?
            .open(path)
            .await
            .map_err(|e| classify(e, Op::Get, path))?;

        Ok(Box::pin(file))
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<()> {
        let sftp = self.session()?;

        if !recursive {
            return sftp
                .create_dir(path)
                .await
                .map_err(|e| classify(e, Op::Mkdir, path));
        }

        for dir in utils::ancestors(path) {
            match sftp.metadata(dir.as_str()).await {
                Ok(attrs) if attrs.is_dir() => continue,
                Ok(_) => return Err(Error::AlreadyExists(dir)),
                Err(err) if is_no_such_file(&err) => {}
                Err(err) => return Err(classify(err, Op::Mkdir, &dir)),
            }

            trace!("creating {dir}");
            sftp.create_dir(dir.as_str())
                .await
                .map_err(|e| classify(e, Op::Mkdir, &dir))?;
        }

        Ok(())
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> Result<()> {
        let sftp = self.session()?;

        if recursive {
            remove_tree(sftp, path).await
        } else {
            sftp.remove_dir(path)
                .await
                .map_err(|e| classify(e, Op::Rmdir, path))
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.session()?
            .remove_file(path)
            .await
            .map_err(|e| classify(e, Op::Delete, path))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.session()?
            .rename(old_path, new_path)
            .await
            .map_err(|e| classify(e, Op::Rename, old_path))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!("closing sftp session on {}", self.addr);
        let closed = self
            .sftp
            .close()
            .await
            .map_err(|e| classify(e, Op::Close, &self.addr));

        if let Some(ssh) = self.ssh.lock().await.take() {
            ssh.disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| Error::backend(Backend::Sftp, &self.addr, e))?;
        }

        closed
    }
}

impl Drop for SftpFileSystem {
    fn drop(&mut self) {
        let Some(ssh) = self.ssh.get_mut().take() else {
            return;
        };

        if let Ok(handle) = Handle::try_current() {
            let addr = self.addr.clone();
            let _ = handle.spawn(async move {
                if let Err(err) = ssh
                    .disconnect(Disconnect::ByApplication, "", "English")
                    .await
                {
                    warn!("ssh disconnect from {addr} failed: {err}");
                }
            });
        }
    }
}

/// Removes the content of `path` depth-first, then `path` itself.
fn remove_tree<'a>(sftp: &'a SftpSession, path: &'a str) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        debug!("removing sftp directory tree {path}");

        let entries = sftp
            .read_dir(path)
            .await
            .map_err(|e| classify(e, Op::Rmdir, path))?;

        for entry in entries {
            let child = utils::join(path, &entry.file_name());
            if entry.file_type().is_dir() {
                remove_tree(sftp, &child).await?;
            } else {
                sftp.remove_file(child.as_str())
                    .await
                    .map_err(|e| classify(e, Op::Delete, &child))?;
            }
        }

        sftp.remove_dir(path)
            .await
            .map_err(|e| classify(e, Op::Rmdir, path))
    })
}
