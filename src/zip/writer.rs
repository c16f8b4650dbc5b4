use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::{ArchiveError, Result};
use crate::io::open_write_stream;
use crate::stream::ByteSink;

use super::structures::*;
use super::vfile::{FileContents, S_IFDIR, S_IFREG, VirtualFile};

const CHUNK_SIZE: usize = 64 * 1024;

/// Highest entry count a plain end record can express; 0xFFFF marks ZIP64.
const MAX_ENTRIES: usize = 0xFFFE;

/// Mode recorded for directory entries.
const DIRECTORY_MODE: u32 = S_IFDIR | 0o775;

/// MS-DOS directory attribute, low byte of the external attributes.
const DOS_DIRECTORY: u32 = 0x10;

/// Settings for [`ArchiveWriter`].
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// Deflate level for entries that are not stored plain.
    pub compression: Compression,
    /// Mode recorded for buffer and stream entries.
    pub default_mode: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            default_mode: S_IFREG | 0o664,
        }
    }
}

/// Streams a new archive into `W`.
///
/// Each append writes its entry to the output before returning, so output
/// order is append order. [`finish`](ArchiveWriter::finish) consumes the
/// writer, writes the central directory and shuts the output down.
pub struct ArchiveWriter<W> {
    output: W,
    offset: u64,
    entries: Vec<ZipFileEntry>,
    options: WriterOptions,
}

impl ArchiveWriter<ByteSink> {
    /// Write to the file at `path` (parents created), or standard output when `None`.
    pub async fn create(path: Option<&Path>) -> Result<Self> {
        Ok(Self::new(open_write_stream(path).await?))
    }
}

impl<W: AsyncWrite + Unpin> ArchiveWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_options(output, WriterOptions::default())
    }

    pub fn with_options(output: W, options: WriterOptions) -> Self {
        Self {
            output,
            offset: 0,
            entries: Vec::new(),
            options,
        }
    }

    /// Entries recorded so far, in output order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Store `bytes` under `relative`. `plain` stores without compression.
    pub async fn append_buffer(
        &mut self,
        relative: &str,
        bytes: impl AsRef<[u8]>,
        modified: SystemTime,
        plain: bool,
    ) -> Result<()> {
        let mode = self.options.default_mode;
        self.write_buffered(relative, bytes.as_ref(), modified, mode, plain)
            .await
    }

    /// Store a virtual file, keeping its modification time and mode.
    pub async fn append_file(
        &mut self,
        relative: &str,
        file: VirtualFile,
        plain: bool,
    ) -> Result<()> {
        let mode = file.archive_mode();
        match file.contents {
            FileContents::Buffered(bytes) => {
                self.write_buffered(relative, &bytes, file.modified, mode, plain)
                    .await
            }
            FileContents::Streamed(stream) => {
                self.write_streamed(relative, stream, file.modified, mode, plain)
                    .await
            }
        }
    }

    /// Encode `stream` chunk by chunk without buffering the whole entry.
    pub async fn append_stream<S: AsyncRead + Unpin>(
        &mut self,
        relative: &str,
        stream: S,
        modified: SystemTime,
        plain: bool,
    ) -> Result<()> {
        let mode = self.options.default_mode;
        self.write_streamed(relative, stream, modified, mode, plain)
            .await
    }

    /// Write the central directory and end record, shut the output down and
    /// hand it back.
    pub async fn finish(mut self) -> Result<W> {
        let cd_offset = fits_u32(self.offset, "central directory offset")?;

        let mut directory = Vec::new();
        for entry in &self.entries {
            directory.extend_from_slice(&entry.central_header_bytes()?);
        }
        let cd_size = fits_u32(directory.len() as u64, "central directory")?;
        let eocd =
            EndOfCentralDirectory::single_disk(self.entries.len() as u16, cd_size, cd_offset);
        directory.extend_from_slice(&eocd.to_bytes()?);

        self.write_raw(&directory).await?;
        self.output.shutdown().await?;

        debug!(
            entries = self.entries.len(),
            bytes = self.offset,
            "finished archive"
        );
        Ok(self.output)
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_all(bytes).await?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn begin_entry(
        &self,
        relative: &str,
        modified: SystemTime,
        mode: u32,
        plain: bool,
        flags: u16,
    ) -> Result<ZipFileEntry> {
        let file_name = entry_name(relative)?;
        if file_name.len() > u16::MAX as usize {
            return Err(ArchiveError::Unsupported(format!(
                "entry name of {} bytes",
                file_name.len()
            )));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(ArchiveError::Unsupported(format!(
                "more than {MAX_ENTRIES} entries needs ZIP64"
            )));
        }

        let (last_mod_time, last_mod_date) = dos_datetime(modified);
        let compression_method = if plain {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        };
        let is_directory = file_name.ends_with('/');
        let external_attrs = if is_directory {
            (DIRECTORY_MODE << 16) | DOS_DIRECTORY
        } else {
            mode << 16
        };

        Ok(ZipFileEntry {
            file_name,
            compression_method,
            flags: flags | FLAG_UTF8,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: fits_u32(self.offset, "local header offset")? as u64,
            last_mod_time,
            last_mod_date,
            version_made_by: VERSION_MADE_BY_UNIX,
            external_attrs,
            is_directory,
        })
    }

    async fn write_buffered(
        &mut self,
        relative: &str,
        bytes: &[u8],
        modified: SystemTime,
        mode: u32,
        plain: bool,
    ) -> Result<()> {
        let mut entry = self.begin_entry(relative, modified, mode, plain, 0)?;

        let data: Cow<'_, [u8]> = if plain {
            Cow::Borrowed(bytes)
        } else {
            let mut encoder = DeflateEncoder::new(Vec::new(), self.options.compression);
            encoder.write_all(bytes)?;
            Cow::Owned(encoder.finish()?)
        };

        entry.crc32 = crc32fast::hash(bytes);
        entry.uncompressed_size = fits_u32(bytes.len() as u64, &entry.file_name)? as u64;
        entry.compressed_size = fits_u32(data.len() as u64, &entry.file_name)? as u64;

        self.write_raw(&entry.local_header_bytes()?).await?;
        self.write_raw(&data).await?;
        self.record(entry);
        Ok(())
    }

    async fn write_streamed<S: AsyncRead + Unpin>(
        &mut self,
        relative: &str,
        mut stream: S,
        modified: SystemTime,
        mode: u32,
        plain: bool,
    ) -> Result<()> {
        let mut entry = self.begin_entry(relative, modified, mode, plain, FLAG_DATA_DESCRIPTOR)?;
        self.write_raw(&entry.local_header_bytes()?).await?;

        let mut crc = crc32fast::Hasher::new();
        let mut uncompressed = 0u64;
        let mut compressed = 0u64;
        let mut encoder =
            (!plain).then(|| DeflateEncoder::new(Vec::new(), self.options.compression));
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            crc.update(chunk);
            uncompressed += n as u64;

            match encoder.as_mut() {
                Some(encoder) => {
                    encoder.write_all(chunk)?;
                    let out = std::mem::take(encoder.get_mut());
                    compressed += out.len() as u64;
                    self.write_raw(&out).await?;
                }
                None => {
                    compressed += n as u64;
                    self.write_raw(chunk).await?;
                }
            }
        }
        if let Some(encoder) = encoder {
            let tail = encoder.finish()?;
            compressed += tail.len() as u64;
            self.write_raw(&tail).await?;
        }

        entry.crc32 = crc.finalize();
        entry.uncompressed_size = fits_u32(uncompressed, &entry.file_name)? as u64;
        entry.compressed_size = fits_u32(compressed, &entry.file_name)? as u64;

        self.write_raw(&entry.data_descriptor_bytes()?).await?;
        self.record(entry);
        Ok(())
    }

    fn record(&mut self, entry: ZipFileEntry) {
        trace!(
            entry = %entry.file_name,
            size = entry.uncompressed_size,
            compressed = entry.compressed_size,
            "appended entry"
        );
        self.entries.push(entry);
    }
}

fn fits_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ArchiveError::Unsupported(format!("{what}: {value} bytes needs ZIP64")))
}

/// Normalize `relative` to an archive-internal name with `/` separators.
fn entry_name(relative: &str) -> Result<String> {
    let name = relative.replace('\\', "/");
    let escapes = name.is_empty()
        || name.starts_with('/')
        || name.as_bytes().get(1) == Some(&b':')
        || name.split('/').any(|part| part == "..");
    if escapes {
        return Err(ArchiveError::UnsafePath(relative.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_use_forward_slashes() {
        assert_eq!(entry_name("a\\b\\c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(entry_name("dir/").unwrap(), "dir/");
    }

    #[tokio::test]
    async fn entry_count_stops_below_zip64_marker() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.append_buffer("first", "x", SystemTime::now(), true).await.unwrap();
        let template = writer.entries[0].clone();
        writer.entries.resize(MAX_ENTRIES - 1, template);

        writer.append_buffer("last", "x", SystemTime::now(), true).await.unwrap();
        assert_eq!(writer.entries().len(), 65534);

        let result = writer.append_buffer("overflow", "x", SystemTime::now(), true).await;
        match result {
            Err(ArchiveError::Unsupported(message)) => {
                assert_eq!(message, "more than 65534 entries needs ZIP64")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(writer.entries().len(), 65534);
    }

    #[tokio::test]
    async fn directory_entries_record_directory_mode() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.append_buffer("assets/", "", SystemTime::now(), false).await.unwrap();
        writer.append_buffer("assets/a.txt", "a", SystemTime::now(), false).await.unwrap();

        let dir = &writer.entries()[0];
        assert!(dir.is_directory);
        assert_eq!(dir.unix_mode(), Some(0o040775));
        assert_eq!(dir.external_attrs & 0xFF, DOS_DIRECTORY);
        assert_eq!(writer.entries()[1].unix_mode(), Some(0o100664));
    }

    #[test]
    fn entry_names_stay_relative() {
        for bad in ["", "/etc/passwd", "C:/x", "a/../../b", "..\\up"] {
            assert!(
                matches!(entry_name(bad), Err(ArchiveError::UnsafePath(_))),
                "{bad} accepted"
            );
        }
    }
}
