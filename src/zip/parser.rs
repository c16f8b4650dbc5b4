//! Central directory scanner.
//!
//! ZIP files are read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for the real directory location
//! 3. Read the Central Directory in one request and parse every record
//! 4. For decoding, read each entry's Local File Header to find its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, ErrorKind, Read};
use std::sync::Arc;

use crate::error::{ArchiveError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds the tail that is searched for an EOCD followed by a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP structure parser over a random-access source.
///
/// Usually reached through [`Archive`](super::Archive), which indexes the
/// entries this parser lists and opens decoding streams at the offsets it
/// resolves.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// for entry in parser.list_files().await? {
///     let offset = parser.get_data_offset(&entry).await?;
///     // Decode `entry.compressed_size` bytes from `offset`...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

fn truncated(e: ArchiveError) -> ArchiveError {
    match e {
        ArchiveError::Io(e) if e.kind() == ErrorKind::UnexpectedEof => {
            ArchiveError::format("truncated central directory")
        }
        e => e,
    }
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a parser for `reader`.
    ///
    /// # Arguments
    ///
    /// * `reader` - A shared handle on a source implementing [`ReadAt`]
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Tries the comment-less position first, then searches backwards
    /// through the largest possible comment.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of the EOCD in the file).
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Format`] when no valid EOCD exists, meaning the
    /// source is not a ZIP archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        // Search backwards for PK\x05\x06 whose comment length reaches exactly to EOF
        for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ArchiveError::format("end of central directory not found"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has fields saturated at 0xFFFF or
    /// 0xFFFFFFFF; the locator sits immediately before the regular EOCD.
    ///
    /// # Arguments
    ///
    /// * `eocd_offset` - Offset of the regular EOCD in the file
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Format`] when the locator or record is missing or
    /// carries the wrong signature.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| ArchiveError::format("missing ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await
            .map_err(|e| truncated(e.into()))?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Read every Central Directory record, in directory order.
    ///
    /// The whole directory is fetched with a single read.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Format`] when the directory lies outside the file,
    /// is truncated, or holds a record with a bad signature.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.checked_add(cd_size).is_none_or(|end| end > self.size) {
            return Err(ArchiveError::format(
                "central directory lies outside the file",
            ));
        }

        // One request for the whole directory
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        // Each record is at least CDFH_MIN_SIZE bytes; don't trust the count for capacity
        let capacity = (total_entries as usize).min(cd_data.len() / CDFH_MIN_SIZE);
        let mut entries = Vec::with_capacity(capacity);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..total_entries {
            let entry = Self::parse_cdfh(&mut cursor).map_err(truncated)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse one Central Directory File Header.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(ArchiveError::format(format!(
                "invalid central directory header at offset {}",
                cursor.position() - 4
            )));
        }

        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

        let is_directory = file_name.ends_with('/');

        // ZIP64 extended information lives in extra field 0x0001
        let extra_field_end = cursor.position() + extra_field_length as u64;

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()?;
            let field_end = cursor.position() + field_size as u64;

            if header_id == 0x0001 {
                // Present only for header fields saturated at 0xFFFFFFFF, in this order
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            cursor.set_position(field_end);
        }

        cursor.set_position(extra_field_end + file_comment_length as u64);
        if cursor.position() > cursor.get_ref().len() as u64 {
            return Err(ArchiveError::format("truncated central directory"));
        }

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            flags,
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            version_made_by,
            external_attrs,
            is_directory,
        })
    }

    /// Get the offset where an entry's stored or compressed data begins.
    ///
    /// The local header's name and extra fields may differ in length from
    /// the central directory's, so the local header is read.
    ///
    /// # Arguments
    ///
    /// * `entry` - An entry listed by [`list_files`](Self::list_files)
    ///
    /// # Returns
    ///
    /// The absolute offset of the entry's first data byte.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Format`] when the local header is invalid or the
    /// data would run past the end of the archive.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await
            .map_err(|e| truncated(e.into()))?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ArchiveError::format(format!(
                "invalid local file header for {}",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf[26..]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset + entry.compressed_size > self.size {
            return Err(ArchiveError::format(format!(
                "data for {} extends past the end of the archive",
                entry.file_name
            )));
        }

        Ok(data_offset)
    }

    /// The shared source, for streams that outlive this parser.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}
