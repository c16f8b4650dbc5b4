use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Read `stream` to its end and return every byte it produced.
pub async fn drain_buffer<S: AsyncRead + Unpin>(mut stream: S) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Read `stream` to its end and decode it as UTF-8.
///
/// Invalid sequences decode to U+FFFD. Carriage returns are removed unless
/// `with_crs` is set.
pub async fn drain_text<S: AsyncRead + Unpin>(stream: S, with_crs: bool) -> Result<String> {
    let bytes = drain_buffer(stream).await?;
    Ok(decode_text(&bytes, with_crs))
}

pub(crate) fn decode_text(bytes: &[u8], with_crs: bool) -> String {
    let text = String::from_utf8_lossy(bytes);
    if with_crs {
        text.into_owned()
    } else {
        text.replace('\r', "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_carriage_returns() {
        assert_eq!(decode_text(b"a\r\nb\r\n", false), "a\nb\n");
        assert_eq!(decode_text(b"a\r\nb\r\n", true), "a\r\nb\r\n");
        assert_eq!(decode_text(b"lone\rcr", false), "lonecr");
    }

    #[test]
    fn replaces_invalid_utf8() {
        assert_eq!(decode_text(b"ok\xff", true), "ok\u{fffd}");
    }
}
