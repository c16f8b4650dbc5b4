//! ZIP archive reading, writing and extraction.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (EOCD, headers, descriptors) and their encodings
//! - [`parser`]: central directory scan over a [`ReadAt`](crate::io::ReadAt) source
//! - `entry_stream`: per-entry decoding stream (stored or deflate, CRC checked)
//! - [`Archive`]: name-indexed entry table with per-entry streams
//! - [`ArchiveWriter`]: append-only archive builder writing as it goes
//! - [`VirtualFile`]: content plus file metadata, buffered or streamed
//! - extraction: [`Archive::extract_all`] and [`select_entries`]
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD, so an archive is indexed without touching
//! entry data. Writing emits each entry as it is appended and the central
//! directory on finish.
//!
//! ## Limitations
//!
//! - STORED and DEFLATE only
//! - No encryption, no multi-disk archives
//! - ZIP64 archives can be read but not written

mod entry_stream;
mod extractor;
pub mod parser;
mod reader;
pub mod structures;
mod vfile;
mod writer;

pub use extractor::select_entries;
pub use parser::ZipParser;
pub use reader::Archive;
pub use structures::{CompressionMethod, ZipFileEntry};
pub use vfile::{FileContents, VirtualFile};
pub use writer::{ArchiveWriter, WriterOptions};
