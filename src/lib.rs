//! # zipstream
//!
//! Streaming ZIP archive I/O over async byte streams.
//!
//! Archives are indexed from their central directory and their entries are
//! decoded lazily, each as its own stream, so a large archive never has to
//! be held in memory. New archives are written entry by entry straight into
//! any [`AsyncWrite`](tokio::io::AsyncWrite) destination.
//!
//! ## Features
//!
//! - Index local or in-memory archives, rejecting duplicate names
//! - Per-entry decoded streams with CRC verification
//! - Stream-to-stream copy with two-sided error propagation
//! - Concurrent extraction of a selection of entries into a directory
//! - Archive writing from buffers, files and streams
//! - Standard input/output fallback when no path is given
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::SystemTime;
//! use zipstream::{Archive, ArchiveWriter};
//!
//! #[tokio::main]
//! async fn main() -> zipstream::Result<()> {
//!     let archive = Archive::open("bundle.zip").await?;
//!
//!     // Unpack everything under `payload/` into `out/`
//!     let selection = archive.select("payload/", None);
//!     archive.extract_all(selection, Path::new("out")).await?;
//!
//!     // Repack one entry into a new archive
//!     let mut writer = ArchiveWriter::create(Some(Path::new("slim.zip"))).await?;
//!     if let Some(entry) = archive.entry("payload/manifest.json") {
//!         let stream = archive.entry_stream(entry).await?;
//!         writer
//!             .append_stream("manifest.json", stream, SystemTime::now(), false)
//!             .await?;
//!     }
//!     writer.finish().await?;
//!     archive.close();
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod io;
pub mod stream;
pub mod zip;

pub use error::{ArchiveError, Result};
pub use io::{LocalFileReader, ReadAt};
pub use stream::{ByteSink, ByteStream, copy, drain_buffer, drain_text, ready};
pub use zip::{
    Archive, ArchiveWriter, FileContents, VirtualFile, WriterOptions, ZipFileEntry, select_entries,
};
