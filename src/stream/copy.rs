use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::future::{self, Future, Ready};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::stream_input;
use crate::error::Result;

/// Wrap an endpoint that is already open so it can be handed to [`copy`].
pub fn ready<T>(value: T) -> Ready<Result<T>> {
    future::ready(Ok(value))
}

/// Copy everything from `source` into `destination`.
///
/// Both endpoints are awaited together; if either fails to open, the copy
/// fails without forwarding a byte. Once both are open, chunks are forwarded
/// in source order until end of data, then the destination is shut down.
/// The first error from either side ends the copy.
///
/// Returns the number of bytes copied.
pub async fn copy<S, D>(
    source: impl Future<Output = Result<S>>,
    destination: impl Future<Output = Result<D>>,
) -> Result<u64>
where
    S: AsyncRead + Unpin,
    D: AsyncWrite + Unpin,
{
    let (mut source, mut destination) = tokio::try_join!(source, destination)?;
    let copied = tokio::io::copy(&mut source, &mut destination).await?;
    destination.shutdown().await?;
    trace!(bytes = copied, "copy complete");
    Ok(copied)
}

/// Serialize `value` as JSON indented by one space and copy it to `destination`.
pub async fn copy_json<T, D>(
    value: &T,
    destination: impl Future<Output = Result<D>>,
) -> Result<u64>
where
    T: Serialize + ?Sized,
    D: AsyncWrite + Unpin,
{
    let mut json = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut json, PrettyFormatter::with_indent(b" "));
    value
        .serialize(&mut serializer)
        .map_err(std::io::Error::from)?;
    copy(ready(stream_input([json])), destination).await
}
