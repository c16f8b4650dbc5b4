use super::ReadAt;
use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Local file reader with random access support
///
/// Reads are positional, so concurrent readers never share a file cursor.
/// Each read runs on tokio's blocking pool.
pub struct LocalFileReader {
    file: Arc<File>,
    size: u64,
}

impl LocalFileReader {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let file = Arc::new(file.into_std().await);
        Ok(Self { file, size })
    }
}

#[cfg(unix)]
fn read_at_offset(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at_offset(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(not(any(unix, windows)))]
fn read_at_offset(_file: &File, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "positional reads are not available on this platform",
    ))
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let file = Arc::clone(&self.file);
        let len = buf.len();
        let data = tokio::task::spawn_blocking(move || {
            let mut data = vec![0u8; len];
            let n = read_at_offset(&file, offset, &mut data)?;
            data.truncate(n);
            Ok::<_, io::Error>(data)
        })
        .await
        .map_err(io::Error::other)??;

        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn positional_reads_do_not_share_a_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
        std::fs::write(&path, &payload).unwrap();

        let reader = Arc::new(LocalFileReader::open(&path).await.unwrap());
        assert_eq!(reader.size(), payload.len() as u64);

        let reads = (0..8u64).map(|i| {
            let reader = Arc::clone(&reader);
            async move {
                let offset = i * 12_345;
                let mut buf = vec![0u8; 4096];
                reader.read_exact_at(offset, &mut buf).await.map(|_| (offset, buf))
            }
        });
        for (offset, buf) in futures::future::try_join_all(reads).await.unwrap() {
            let start = offset as usize;
            assert_eq!(buf, payload[start..start + 4096]);
        }
    }

    #[tokio::test]
    async fn reads_past_the_end_are_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let reader = LocalFileReader::open(&path).await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_at(6, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");
        assert_eq!(reader.read_at(10, &mut buf).await.unwrap(), 0);

        let err = reader.read_exact_at(6, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
