//! FTP backend.

mod error;
mod list;
mod stream;

pub use list::{parse_line, parse_listing, FtpListing};

use async_ftp::{types::FileType, FtpError, FtpStream};
use futures::future::BoxFuture;
use std::{mem, sync::Arc};
use tokio::{
    runtime::Handle,
    sync::{MappedMutexGuard, Mutex, MutexGuard},
};

use self::{
    error::{classify, is_unexplained},
    stream::RetrStream,
};
use crate::{
    error::{Error, Op, Result},
    file::{FileInfo, DIR_TAG},
    fs::{ByteStream, FileSystem},
    utils,
};

pub const DEFAULT_PORT: u16 = 21;

/// [`FileSystem`] over a single FTP control connection.
///
/// The connection is established by [`FtpFileSystem::create`] and kept
/// until [`FileSystem::close`] or drop. FTP commands on one connection are
/// strictly sequential, so operations wait for each other. A stream
/// returned by [`FileSystem::get`] keeps the connection busy until it was
/// read to the end or dropped.
pub struct FtpFileSystem {
    addr: String,
    stream: Arc<Mutex<Option<FtpStream>>>,
}

impl FtpFileSystem {
    /// Connects and logs in. Resolves only once the server accepted the login.
    pub async fn create(host: &str, port: u16, user: &str, password: &str) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("connecting to ftp://{user}@{addr}");

        let mut stream = FtpStream::connect((host, port))
            .await
            .map_err(|e| Error::Connection(format!("{addr}: {e}")))?;

        stream
            .login(user, password)
            .await
            .map_err(|e| Error::Connection(format!("{addr}: {e}")))?;

        stream
            .transfer_type(FileType::Binary)
            .await
            .map_err(|e| Error::Connection(format!("{addr}: {e}")))?;

        debug!("ftp session ready on {addr}");

        Ok(Self {
            addr,
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }

    async fn session(&self) -> Result<MappedMutexGuard<'_, FtpStream>> {
        MutexGuard::try_map(self.stream.lock().await, Option::as_mut).map_err(|_| self.closed())
    }

    fn closed(&self) -> Error {
        Error::Connection(format!("{}: session closed", self.addr))
    }
}

#[async_trait]
impl FileSystem for FtpFileSystem {
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let lines = self
            .session()
            .await?
            .list(Some(path))
            .await
            .map_err(|e| classify(e, Op::List, path))?;

        Ok(parse_listing(lines).into_iter().map(FileInfo::from).collect())
    }

    async fn put(&self, mut src: ByteStream, to_path: &str) -> Result<()> {
        self.session()
            .await?
            .put(to_path, &mut src)
            .await
            .map_err(|e| classify(e, Op::Put, to_path))
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        let mut session = Arc::clone(&self.stream).lock_owned().await;
        let Some(ftp) = session.as_mut() else {
            return Err(self.closed());
        };

        let data = ftp
            .get(path)
            .await
            .map_err(|e| classify(e, Op::Get, path))?;

        Ok(Box::pin(RetrStream::new(path, data, session)))
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<()> {
        let mut ftp = self.session().await?;

        if !recursive {
            return make_dir(&mut ftp, path).await;
        }

        let origin = ftp.pwd().await.map_err(|e| classify(e, Op::Mkdir, path))?;
        let created = make_dirs(&mut ftp, path).await;
        let restored = ftp
            .cwd(&origin)
            .await
            .map_err(|e| classify(e, Op::Mkdir, &origin));

        created.and(restored)
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> Result<()> {
        let mut ftp = self.session().await?;

        if recursive {
            remove_tree(&mut ftp, path).await
        } else {
            remove_dir(&mut ftp, path).await
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.session()
            .await?
            .rm(path)
            .await
            .map_err(|e| classify(e, Op::Delete, path))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.session()
            .await?
            .rename(old_path, new_path)
            .await
            .map_err(|e| classify(e, Op::Rename, old_path))
    }

    async fn close(&self) -> Result<()> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };

        debug!("closing ftp session on {}", self.addr);
        stream
            .quit()
            .await
            .map_err(|e| classify(e, Op::Close, &self.addr))
    }
}

impl Drop for FtpFileSystem {
    fn drop(&mut self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };

        // a pending download may still hold the connection
        let stream = Arc::clone(&self.stream);
        let addr = mem::take(&mut self.addr);
        let _ = handle.spawn(async move {
            let Some(mut ftp) = stream.lock().await.take() else {
                return;
            };
            if let Err(err) = ftp.quit().await {
                warn!("ftp quit on {addr} failed: {err}");
            }
        });
    }
}

async fn make_dir(ftp: &mut FtpStream, path: &str) -> Result<()> {
    match ftp.mkdir(path).await {
        Ok(()) => Ok(()),
        Err(err) if is_unexplained(&err, Op::Mkdir) => {
            Err(explain(ftp, err, Op::Mkdir, path).await)
        }
        Err(err) => Err(classify(err, Op::Mkdir, path)),
    }
}

async fn remove_dir(ftp: &mut FtpStream, path: &str) -> Result<()> {
    match ftp.rmdir(path).await {
        Ok(()) => Ok(()),
        Err(err) if is_unexplained(&err, Op::Rmdir) => {
            Err(explain(ftp, err, Op::Rmdir, path).await)
        }
        Err(err) => Err(classify(err, Op::Rmdir, path)),
    }
}

/// Some servers answer every failed `MKD`/`RMD` with the same 550 text.
/// Looks at `path` and its parent to tell "exists", "not empty" and "not
/// found" apart, then returns to the previous working directory.
async fn explain(ftp: &mut FtpStream, err: FtpError, op: Op, path: &str) -> Error {
    let Ok(origin) = ftp.pwd().await else {
        return classify(err, op, path);
    };

    let (parent, name) = utils::split(path);
    let is_dir = ftp.cwd(path).await.is_ok();
    let parent_exists = is_dir || ftp.cwd(parent).await.is_ok();
    // the working directory is `parent` here
    let is_other = !is_dir
        && parent_exists
        && ftp
            .list(None)
            .await
            .is_ok_and(|lines| parse_listing(lines).iter().any(|entry| entry.name == name));

    if let Err(e) = ftp.cwd(&origin).await {
        return classify(e, op, &origin);
    }
    trace!("{path}: dir={is_dir} parent={parent_exists} other={is_other}");

    match op {
        Op::Mkdir if is_dir || is_other => Error::AlreadyExists(path.to_owned()),
        Op::Rmdir if is_dir => Error::NotEmpty(path.to_owned()),
        _ if !parent_exists => Error::NotFound(path.to_owned()),
        Op::Rmdir if !is_other => Error::NotFound(path.to_owned()),
        _ => classify(err, op, path),
    }
}

/// Walks `path` component by component from the current directory,
/// creating whatever is missing. Leaves the working directory at `path`.
async fn make_dirs(ftp: &mut FtpStream, path: &str) -> Result<()> {
    if path.starts_with('/') {
        ftp.cwd("/").await.map_err(|e| classify(e, Op::Mkdir, "/"))?;
    }

    for part in path.split('/').filter(|p| !p.is_empty()) {
        if ftp.cwd(part).await.is_ok() {
            continue;
        }

        trace!("creating {part} of {path}");
        make_dir(ftp, part).await?;
        ftp.cwd(part)
            .await
            .map_err(|e| classify(e, Op::Mkdir, path))?;
    }

    Ok(())
}

/// Removes files, then subdirectories, then `path` itself.
fn remove_tree<'a>(ftp: &'a mut FtpStream, path: &'a str) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        debug!("removing ftp directory tree {path}");

        let lines = ftp
            .list(Some(path))
            .await
            .map_err(|e| classify(e, Op::Rmdir, path))?;

        for entry in parse_listing(lines) {
            let child = utils::join(path, &entry.name);
            if entry.type_tag == DIR_TAG {
                remove_tree(ftp, &child).await?;
            } else {
                ftp.rm(&child)
                    .await
                    .map_err(|e| classify(e, Op::Delete, &child))?;
            }
        }

        remove_dir(ftp, path).await
    })
}
