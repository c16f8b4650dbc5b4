use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use std::io::{self, Cursor};
use std::time::SystemTime;

use crate::error::{ArchiveError, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// General purpose flag: entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: CRC and sizes follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: name is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Version needed to extract deflate entries (2.0).
pub const VERSION_NEEDED: u16 = 20;
/// Version made by: Unix host, format version 2.0.
pub const VERSION_MADE_BY_UNIX: u16 = (3 << 8) | 20;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ArchiveError::format("invalid end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Build the record closing a single-disk archive without a comment.
    pub fn single_disk(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(out)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ArchiveError::format("invalid ZIP64 locator"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ArchiveError::format("invalid ZIP64 end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor trailing a streamed entry - 16 bytes with signature
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// Parsed ZIP file entry information
///
/// Produced once by indexing (or by the writer when it records an entry)
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub version_made_by: u16,
    pub external_attrs: u32,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Modification time as a local wall-clock value, if the DOS fields are valid.
    pub fn modified(&self) -> Option<NaiveDateTime> {
        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?.and_hms_opt(
            hour as u32,
            minute as u32,
            second as u32,
        )
    }

    /// Unix permission and file type bits, when the entry was made on a Unix host.
    pub fn unix_mode(&self) -> Option<u32> {
        let mode = self.external_attrs >> 16;
        (self.version_made_by >> 8 == 3 && mode != 0).then_some(mode)
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Encode the local file header that precedes this entry's data.
    ///
    /// Entries carrying a data descriptor write zero CRC and sizes here.
    pub fn local_header_bytes(&self) -> io::Result<Vec<u8>> {
        let name = self.file_name.as_bytes();
        let (crc32, compressed, uncompressed) = if self.has_data_descriptor() {
            (0, 0, 0)
        } else {
            (
                self.crc32,
                self.compressed_size as u32,
                self.uncompressed_size as u32,
            )
        };

        let mut out = Vec::with_capacity(LFH_SIZE + name.len());
        out.extend_from_slice(LFH_SIGNATURE);
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(crc32)?;
        out.write_u32::<LittleEndian>(compressed)?;
        out.write_u32::<LittleEndian>(uncompressed)?;
        out.write_u16::<LittleEndian>(name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?;
        out.extend_from_slice(name);
        Ok(out)
    }

    /// Encode the data descriptor written after a streamed entry's data.
    pub fn data_descriptor_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        Ok(out)
    }

    /// Encode this entry's central directory record.
    pub fn central_header_bytes(&self) -> io::Result<Vec<u8>> {
        let name = self.file_name.as_bytes();
        let mut out = Vec::with_capacity(CDFH_MIN_SIZE + name.len());
        out.extend_from_slice(CDFH_SIGNATURE);
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        out.write_u16::<LittleEndian>(name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // extra field
        out.write_u16::<LittleEndian>(0)?; // comment
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(self.lfh_offset as u32)?;
        out.extend_from_slice(name);
        Ok(out)
    }
}

/// Pack a timestamp into DOS (time, date) fields using local wall-clock time.
///
/// DOS dates start in 1980; earlier timestamps clamp to 1980-01-01 00:00:00.
/// Seconds are stored with two-second resolution.
pub fn dos_datetime(time: SystemTime) -> (u16, u16) {
    let local: DateTime<Local> = time.into();
    pack_dos(local.naive_local())
}

fn pack_dos(t: NaiveDateTime) -> (u16, u16) {
    if t.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let year = t.year().min(1980 + 127) as u16;
    let date = ((year - 1980) << 9) | ((t.month() as u16) << 5) | t.day() as u16;
    let time = ((t.hour() as u16) << 11) | ((t.minute() as u16) << 5) | (t.second() as u16 / 2);
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(time: u16, date: u16) -> ZipFileEntry {
        ZipFileEntry {
            file_name: "a.txt".into(),
            compression_method: CompressionMethod::Stored,
            flags: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: time,
            last_mod_date: date,
            version_made_by: VERSION_MADE_BY_UNIX,
            external_attrs: 0o100644 << 16,
            is_directory: false,
        }
    }

    #[test]
    fn dos_fields_round_trip() {
        let t = NaiveDate::from_ymd_opt(2021, 7, 14)
            .and_then(|d| d.and_hms_opt(13, 45, 22))
            .unwrap();
        let (time, date) = pack_dos(t);
        let entry = entry_with(time, date);
        assert_eq!(entry.mod_date(), (2021, 7, 14));
        assert_eq!(entry.mod_time(), (13, 45, 22));
        assert_eq!(entry.modified(), Some(t));
    }

    #[test]
    fn dos_fields_clamp_before_1980() {
        let t = NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let entry = {
            let (time, date) = pack_dos(t);
            entry_with(time, date)
        };
        assert_eq!(entry.mod_date(), (1980, 1, 1));
    }

    #[test]
    fn unix_mode_requires_unix_host() {
        let mut entry = entry_with(0, 0);
        assert_eq!(entry.unix_mode(), Some(0o100644));
        entry.version_made_by = 20;
        assert_eq!(entry.unix_mode(), None);
    }

    #[test]
    fn eocd_encoding_parses_back() {
        let bytes = EndOfCentralDirectory::single_disk(3, 120, 4096)
            .to_bytes()
            .unwrap();
        let eocd = EndOfCentralDirectory::from_bytes(&bytes).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 120);
        assert_eq!(eocd.cd_offset, 4096);
        assert!(!eocd.is_zip64());
    }
}
