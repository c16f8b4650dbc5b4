//! Stream endpoints and the helpers that move bytes between them.
//!
//! - [`copy()`]: pipe one endpoint into another once both are ready
//! - [`drain_buffer`] / [`drain_text`]: collect a whole stream into memory

mod copy;
mod drain;

pub use copy::{copy, copy_json, ready};
pub use drain::{drain_buffer, drain_text};
pub(crate) use drain::decode_text;

use bytes::Bytes;
use std::io;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::StreamReader;

/// An owned, ordered source of bytes.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// An owned destination for bytes.
pub type ByteSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Build a [`ByteStream`] that yields `chunks` in order and then ends.
pub fn stream_input<I, B>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let chunks: Vec<io::Result<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
    Box::pin(StreamReader::new(futures::stream::iter(chunks)))
}
