use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{self, AsyncWriteExt},
};
use walkdir::WalkDir;

use super::{ByteStream, FileSystem};
use crate::{
    error::{Backend, Error, Result},
    file::FileInfo,
};

/// [`FileSystem`] over the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Never fails, there is nothing to connect to. Exists so the local
    /// backend is built the same way as the remote ones.
    pub async fn create() -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let mut dir = fs::read_dir(path)
            .await
            .map_err(|e| Error::from_io(e, path))?;

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::from_io(e, path))? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        try_join_all(names.into_iter().map(|name| async move {
            let full = Path::new(path).join(&name);
            let metadata = fs::metadata(&full)
                .await
                .map_err(|e| Error::from_io(e, &full.to_string_lossy()))?;
            Ok::<_, Error>(FileInfo::from_metadata(name, &metadata))
        }))
        .await
    }

    async fn put(&self, mut src: ByteStream, to_path: &str) -> Result<()> {
        let mut file = fs::File::create(to_path)
            .await
            .map_err(|e| Error::from_io(e, to_path))?;

        let written = io::copy(&mut src, &mut file)
            .await
            .map_err(|e| Error::from_io(e, to_path))?;
        file.flush().await.map_err(|e| Error::from_io(e, to_path))?;

        trace!("wrote {written} bytes to {to_path}");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| Error::from_io(e, path))?;
        Ok(Box::pin(file))
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<()> {
        let result = if recursive {
            fs::create_dir_all(path).await
        } else {
            fs::create_dir(path).await
        };
        result.map_err(|e| Error::from_io(e, path))
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> Result<()> {
        if !recursive {
            return fs::remove_dir(path)
                .await
                .map_err(|e| Error::from_io(e, path));
        }

        let metadata = fs::symlink_metadata(path)
            .await
            .map_err(|e| Error::from_io(e, path))?;
        if !metadata.is_dir() {
            let err = io::Error::new(io::ErrorKind::NotADirectory, "not a directory");
            return Err(Error::backend(Backend::Local, path, err));
        }

        let root = PathBuf::from(path);
        tokio::task::spawn_blocking(move || remove_tree(&root))
            .await
            .map_err(|e| Error::backend(Backend::Local, path, e))?
    }

    async fn delete(&self, path: &str) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| Error::from_io(e, path))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        fs::rename(old_path, new_path)
            .await
            .map_err(|e| Error::from_io(e, old_path))
    }
}

/// Depth-first removal: children before their directory, links are not followed.
fn remove_tree(root: &Path) -> Result<()> {
    debug!("removing directory tree {}", root.display());

    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .unwrap_or(root)
                .to_string_lossy()
                .into_owned();
            Error::from_io(e.into(), &path)
        })?;

        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| Error::from_io(e, &path.to_string_lossy()))?;
    }

    Ok(())
}
