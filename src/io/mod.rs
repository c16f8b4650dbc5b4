//! Byte sources and the filesystem boundary.
//!
//! [`ReadAt`] is the random-access side used by the archive reader: every
//! read names its own offset, so any number of entry streams can read from
//! one source at the same time. The free functions below are the
//! sequential side: they open files (or the process's standard streams when
//! no path is given) as [`ByteStream`]/[`ByteSink`] endpoints.

mod local;

pub use local::LocalFileReader;

use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::path::Path;
use tokio::fs;

use crate::error::Result;
use crate::stream::{ByteSink, ByteStream};

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` completely, issuing as many reads as the source needs.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("source ended at offset {}", offset + filled as u64),
                ));
            }
            filled += n;
        }
        Ok(())
    }
}

#[async_trait]
impl ReadAt for Vec<u8> {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = offset.min(self.len() as u64) as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Open `path` for sequential reading, or standard input when `path` is `None`.
pub async fn open_read_stream(path: Option<&Path>) -> Result<ByteStream> {
    match path {
        Some(path) => Ok(Box::pin(fs::File::open(path).await?)),
        None => Ok(Box::pin(tokio::io::stdin())),
    }
}

/// Create `path` for writing, or use standard output when `path` is `None`.
///
/// Missing parent directories are created first.
pub async fn open_write_stream(path: Option<&Path>) -> Result<ByteSink> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                make_dirs(parent).await?;
            }
            Ok(Box::pin(fs::File::create(path).await?))
        }
        None => Ok(Box::pin(tokio::io::stdout())),
    }
}

/// Recursively create `path` and its missing ancestors.
pub async fn make_dirs(path: &Path) -> Result<()> {
    if !path.as_os_str().is_empty() {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Remove a file or a directory tree. An absent path is not an error.
pub async fn remove_all(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path).await?;
    } else {
        fs::remove_file(path).await?;
    }
    Ok(())
}
