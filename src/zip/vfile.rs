use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;

use crate::error::Result;
use crate::stream::{ByteStream, decode_text, drain_text};

/// Regular-file type bits, added to modes that carry permissions only.
pub(crate) const S_IFREG: u32 = 0o100000;
pub(crate) const S_IFDIR: u32 = 0o040000;
const S_IFMT: u32 = 0o170000;

/// Where a [`VirtualFile`]'s bytes live.
pub enum FileContents {
    Buffered(Bytes),
    Streamed(ByteStream),
}

impl fmt::Debug for FileContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileContents::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            FileContents::Streamed(_) => f.write_str("Streamed"),
        }
    }
}

/// A piece of content plus the file metadata an archive records for it.
#[derive(Debug)]
pub struct VirtualFile {
    pub modified: SystemTime,
    /// Unix mode bits; permission-only values are treated as regular files.
    pub mode: u32,
    pub contents: FileContents,
}

impl VirtualFile {
    pub fn buffered(contents: impl Into<Bytes>, modified: SystemTime, mode: u32) -> Self {
        Self {
            modified,
            mode,
            contents: FileContents::Buffered(contents.into()),
        }
    }

    pub fn streamed(stream: ByteStream, modified: SystemTime, mode: u32) -> Self {
        Self {
            modified,
            mode,
            contents: FileContents::Streamed(stream),
        }
    }

    /// Stream-backed file for `path`, carrying its modification time and mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path.as_ref()).await?;
        let metadata = file.metadata().await?;
        Ok(Self::streamed(
            Box::pin(file),
            metadata.modified()?,
            mode_of(&metadata),
        ))
    }

    /// Memory-backed file for `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).await?;
        let contents = fs::read(path).await?;
        Ok(Self::buffered(contents, metadata.modified()?, mode_of(&metadata)))
    }

    /// Mode with the regular-file type filled in when absent.
    pub(crate) fn archive_mode(&self) -> u32 {
        if self.mode & S_IFMT == 0 {
            self.mode | S_IFREG
        } else {
            self.mode
        }
    }

    /// Read the contents as UTF-8 text, removing carriage returns unless `with_crs`.
    pub async fn read_text(self, with_crs: bool) -> Result<String> {
        match self.contents {
            FileContents::Buffered(bytes) => Ok(decode_text(&bytes, with_crs)),
            FileContents::Streamed(stream) => drain_text(stream, with_crs).await,
        }
    }
}

#[cfg(unix)]
fn mode_of(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        S_IFREG | 0o444
    } else {
        S_IFREG | 0o644
    }
}
