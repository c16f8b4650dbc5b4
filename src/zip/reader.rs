use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tracing::{debug, trace};

use crate::error::{ArchiveError, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::stream::{ByteStream, drain_buffer, drain_text};

use super::entry_stream::entry_chunks;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// An opened archive and its name-indexed entry table.
///
/// Entries are decoded lazily, so the underlying source stays open until
/// [`close`](Archive::close) (or drop). Entry streams hold their own handle
/// on the source and keep working after the archive is closed.
pub struct Archive<R: ReadAt> {
    parser: ZipParser<R>,
    label: String,
    entries: BTreeMap<String, ZipFileEntry>,
}

impl Archive<LocalFileReader> {
    /// Open and index the archive at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = LocalFileReader::open(path).await?;
        Self::from_reader(Arc::new(reader), path.display().to_string()).await
    }
}

impl<R: ReadAt + 'static> Archive<R> {
    /// Index the archive held by `reader`. `label` names it in errors and logs.
    ///
    /// Fails with [`ArchiveError::DuplicateEntry`] on the first name the
    /// central directory lists twice.
    pub async fn from_reader(reader: Arc<R>, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let parser = ZipParser::new(reader);

        let mut entries = BTreeMap::new();
        for entry in parser.list_files().await? {
            match entries.entry(entry.file_name.clone()) {
                Entry::Occupied(_) => {
                    return Err(ArchiveError::DuplicateEntry {
                        name: entry.file_name,
                        archive: label,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }
        }

        debug!(archive = %label, entries = entries.len(), "indexed archive");
        Ok(Self {
            parser,
            label,
            entries,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entries(&self) -> &BTreeMap<String, ZipFileEntry> {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ZipFileEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Open a stream over the decoded bytes of `entry`.
    ///
    /// Each stream issues its own positional reads, so any number may be
    /// in flight at once.
    pub async fn entry_stream(&self, entry: &ZipFileEntry) -> Result<ByteStream> {
        if entry.is_encrypted() {
            return Err(ArchiveError::Unsupported(format!(
                "{} in {} is encrypted",
                entry.file_name, self.label
            )));
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(ArchiveError::UnsupportedCompression(method));
        }

        let data_offset = self.parser.get_data_offset(entry).await?;
        trace!(archive = %self.label, entry = %entry.file_name, data_offset, "opening entry stream");

        let chunks = entry_chunks(Arc::clone(self.parser.reader()), data_offset, entry);
        Ok(Box::pin(StreamReader::new(chunks)))
    }

    /// Decode `entry` fully into memory.
    pub async fn entry_buffer(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        drain_buffer(self.entry_stream(entry).await?).await
    }

    /// Decode `entry` as UTF-8 text, removing carriage returns unless `with_crs`.
    pub async fn entry_text(&self, entry: &ZipFileEntry, with_crs: bool) -> Result<String> {
        drain_text(self.entry_stream(entry).await?, with_crs).await
    }

    /// Release the archive's handle on its source.
    pub fn close(self) {
        debug!(archive = %self.label, "closed archive");
    }
}
