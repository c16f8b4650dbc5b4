use bytes::Bytes;
use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};
use futures::Stream;
use std::io::{self, ErrorKind};
use std::sync::Arc;

use crate::io::ReadAt;

use super::structures::{CompressionMethod, ZipFileEntry};

const CHUNK_SIZE: usize = 64 * 1024;

fn invalid(message: String) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, message)
}

/// Decoding state for one entry: its own offset into the shared source,
/// its own inflater and checksum.
struct EntryDecoder<R: ReadAt> {
    reader: Arc<R>,
    name: String,
    offset: u64,
    remaining: u64,
    input: Vec<u8>,
    input_pos: usize,
    inflater: Option<Decompress>,
    stream_end: bool,
    crc: Hasher,
    produced: u64,
    expected_crc: u32,
    expected_size: u64,
    finished: bool,
}

impl<R: ReadAt> EntryDecoder<R> {
    fn new(reader: Arc<R>, data_offset: u64, entry: &ZipFileEntry) -> Self {
        let inflater = match entry.compression_method {
            CompressionMethod::Deflate => Some(Decompress::new(false)),
            _ => None,
        };
        Self {
            reader,
            name: entry.file_name.clone(),
            offset: data_offset,
            remaining: entry.compressed_size,
            input: Vec::new(),
            input_pos: 0,
            inflater,
            stream_end: false,
            crc: Hasher::new(),
            produced: 0,
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
            finished: false,
        }
    }

    fn input_exhausted(&self) -> bool {
        self.input_pos == self.input.len() && self.remaining == 0
    }

    async fn refill(&mut self) -> io::Result<()> {
        let len = (CHUNK_SIZE as u64).min(self.remaining) as usize;
        self.input.resize(len, 0);
        self.input_pos = 0;
        self.reader.read_exact_at(self.offset, &mut self.input).await?;
        self.offset += len as u64;
        self.remaining -= len as u64;
        Ok(())
    }

    fn decode(&mut self) -> io::Result<Vec<u8>> {
        let pending = &self.input[self.input_pos..];
        let Some(inflater) = self.inflater.as_mut() else {
            self.input_pos = self.input.len();
            return Ok(pending.to_vec());
        };

        let mut out = Vec::with_capacity(CHUNK_SIZE);
        let before = inflater.total_in();
        let status = inflater
            .decompress_vec(pending, &mut out, FlushDecompress::None)
            .map_err(|e| invalid(format!("corrupt deflate data in {}: {e}", self.name)))?;
        let consumed = (inflater.total_in() - before) as usize;
        self.input_pos += consumed;

        if status == Status::StreamEnd {
            self.stream_end = true;
        } else if consumed == 0 && out.is_empty() && self.input_pos < self.input.len() {
            return Err(invalid(format!("deflate stream stalled in {}", self.name)));
        }
        Ok(out)
    }

    fn verify(&mut self) -> io::Result<()> {
        self.finished = true;
        if self.produced != self.expected_size {
            return Err(invalid(format!(
                "size mismatch for {}: expected {} bytes, got {}",
                self.name, self.expected_size, self.produced
            )));
        }
        let crc = std::mem::take(&mut self.crc).finalize();
        if crc != self.expected_crc {
            return Err(invalid(format!(
                "CRC mismatch for {}: expected {:08x}, got {:08x}",
                self.name, self.expected_crc, crc
            )));
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.input_pos == self.input.len() && self.remaining > 0 && !self.stream_end {
                self.refill().await?;
            }

            let out = if self.stream_end {
                Vec::new()
            } else {
                self.decode()?
            };
            if !out.is_empty() {
                self.crc.update(&out);
                self.produced += out.len() as u64;
                return Ok(Some(Bytes::from(out)));
            }

            if self.stream_end || (self.inflater.is_none() && self.input_exhausted()) {
                self.verify()?;
                return Ok(None);
            }
            if self.input_exhausted() {
                self.finished = true;
                return Err(invalid(format!("deflate data for {} ends early", self.name)));
            }
        }
    }
}

/// Stream the decoded bytes of `entry`, whose data begins at `data_offset`.
///
/// Length and CRC-32 are checked once the data ends; a mismatch surfaces as
/// an `InvalidData` error in place of end of data.
pub(crate) fn entry_chunks<R: ReadAt + 'static>(
    reader: Arc<R>,
    data_offset: u64,
    entry: &ZipFileEntry,
) -> impl Stream<Item = io::Result<Bytes>> + Send + use<R> {
    let decoder = EntryDecoder::new(reader, data_offset, entry);
    futures::stream::try_unfold(decoder, |mut decoder| async move {
        let chunk = decoder.next_chunk().await?;
        Ok::<_, io::Error>(chunk.map(|chunk| (chunk, decoder)))
    })
}
