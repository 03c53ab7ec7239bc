use std::fs::Metadata;

/// Listing type tag for directories, shared by `ls -l` style listings
/// and the SFTP longname convention.
pub(crate) const DIR_TAG: char = 'd';
pub(crate) const FILE_TAG: char = '-';
pub(crate) const SYMLINK_TAG: char = 'l';

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    File,
    Symlink,
    Other,
}

impl FileKind {
    pub(crate) fn from_tag(tag: char) -> Self {
        match tag {
            DIR_TAG => Self::Directory,
            FILE_TAG => Self::File,
            SYMLINK_TAG => Self::Symlink,
            _ => Self::Other,
        }
    }
}

/// One entry of a directory listing.
///
/// Values are only produced by [`FileSystem::list`](crate::FileSystem::list)
/// and hold no reference to the file system they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    size: Option<u64>,
    kind: FileKind,
}

impl FileInfo {
    pub(crate) fn new(name: String, size: Option<u64>, kind: FileKind) -> Self {
        Self { name, size, kind }
    }

    /// Wraps metadata of a local entry.
    pub(crate) fn from_metadata(name: String, metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else if file_type.is_symlink() {
            FileKind::Symlink
        } else {
            FileKind::Other
        };

        Self::new(name, Some(metadata.len()), kind)
    }

    /// Returns the base name of the entry within its parent directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size reported by the backend.
    ///
    /// Remote listings may omit it, and its meaning for directories
    /// depends on the backend.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_listing_tag() {
        assert_eq!(FileKind::from_tag('d'), FileKind::Directory);
        assert_eq!(FileKind::from_tag('-'), FileKind::File);
        assert_eq!(FileKind::from_tag('l'), FileKind::Symlink);
        assert_eq!(FileKind::from_tag('p'), FileKind::Other);
    }

    #[test]
    fn local_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let info = FileInfo::from_metadata("x".to_owned(), &dir.path().metadata().unwrap());
        assert!(info.is_dir());
        assert_eq!(info.name(), "x");
    }
}
