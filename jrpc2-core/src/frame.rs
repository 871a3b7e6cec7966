//! JSON value framing over byte streams
//!
//! The wire format has no framing beyond JSON self-delimitation: peers write
//! one JSON value after another, separated by nothing more than the
//! whitespace the JSON grammar allows. [`JsonReader`] incrementally pulls
//! one complete value at a time off any [`AsyncRead`], and [`write_value`]
//! emits one encoded value (newline-terminated, like every JSON streaming
//! encoder) and flushes.
//!
//! # Error classification
//!
//! The codecs react differently to the ways a read can fail, so
//! [`ReadError`] keeps them apart:
//!
//! - [`ReadError::Eof`]: the stream ended cleanly at a value boundary. The
//!   client propagates this unchanged so the host framework can classify
//!   shutdown; the server stops its serve loop silently.
//! - [`ReadError::UnexpectedEof`]: the stream ended inside a value. The
//!   server answers this with `-32700 Parse error` before giving up.
//! - [`ReadError::Syntax`]: the bytes are not JSON. Also answered with
//!   `-32700` on the server.
//! - [`ReadError::Io`]: the transport failed.

use bytes::{Buf, BytesMut};
use serde::de::IgnoredAny;
use serde::Serialize;
use serde_json::value::RawValue;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_CHUNK: usize = 8 * 1024;

/// Failure modes of [`JsonReader::next_value`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream ended cleanly between values.
    #[error("end of stream")]
    Eof,
    /// The stream ended in the middle of a value.
    #[error("unexpected end of JSON input")]
    UnexpectedEof,
    /// The input is not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    /// The underlying transport failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ReadError {
    /// Whether this is the clean end-of-stream case.
    pub fn is_eof(&self) -> bool {
        matches!(self, ReadError::Eof)
    }
}

/// Incremental reader extracting self-delimited JSON values from a stream.
pub struct JsonReader<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

impl<R: AsyncRead + Unpin> JsonReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Read the next complete JSON value, buffering as much input as the
    /// value needs.
    pub async fn next_value(&mut self) -> Result<Box<RawValue>, ReadError> {
        loop {
            self.trim_leading_whitespace();
            if !self.buf.is_empty() {
                match scan_value(&self.buf, self.eof) {
                    Scan::Complete(end) => {
                        let bytes = self.buf.split_to(end);
                        return serde_json::from_slice(&bytes).map_err(ReadError::Syntax);
                    }
                    Scan::Partial if self.eof => return Err(ReadError::UnexpectedEof),
                    Scan::Partial => {}
                    Scan::Invalid(err) => return Err(ReadError::Syntax(err)),
                }
            } else if self.eof {
                return Err(ReadError::Eof);
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                self.eof = true;
            }
        }
    }

    fn trim_leading_whitespace(&mut self) {
        let n = self
            .buf
            .iter()
            .take_while(|byte| matches!(byte, b' ' | b'\t' | b'\r' | b'\n'))
            .count();
        self.buf.advance(n);
    }
}

enum Scan {
    /// One complete value occupies `buf[..end]`.
    Complete(usize),
    /// The buffer holds a prefix of a value; more input is needed.
    Partial,
    /// The buffer can never become valid JSON.
    Invalid(serde_json::Error),
}

fn scan_value(buf: &[u8], eof: bool) -> Scan {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<IgnoredAny>();
    match stream.next() {
        Some(Ok(IgnoredAny)) => {
            let end = stream.byte_offset();
            // A primitive running to the end of the buffer may continue in
            // the next chunk (a number split across reads); containers and
            // strings are self-terminating.
            if end == buf.len() && !eof && is_open_ended(buf) {
                Scan::Partial
            } else {
                Scan::Complete(end)
            }
        }
        Some(Err(err)) if err.is_eof() => Scan::Partial,
        Some(Err(err)) => Scan::Invalid(err),
        None => Scan::Partial,
    }
}

fn is_open_ended(buf: &[u8]) -> bool {
    !matches!(buf.first(), Some(b'{') | Some(b'[') | Some(b'"'))
}

/// Encode one value, newline-terminated, and flush.
pub async fn write_value<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut bytes = serde_json::to_vec(value).map_err(io::Error::other)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn values_from(input: &str) -> (Vec<String>, ReadError) {
        let mut reader = JsonReader::new(input.as_bytes());
        let mut values = Vec::new();
        loop {
            match reader.next_value().await {
                Ok(value) => values.push(value.get().to_owned()),
                Err(err) => return (values, err),
            }
        }
    }

    #[tokio::test]
    async fn reads_consecutive_values() {
        let (values, err) = values_from("{\"a\":1}\n[1,2] \t \"x\" 42 ").await;
        assert_eq!(values, ["{\"a\":1}", "[1,2]", "\"x\"", "42"]);
        assert!(err.is_eof());
    }

    #[tokio::test]
    async fn empty_and_whitespace_input_is_clean_eof() {
        let (values, err) = values_from("").await;
        assert!(values.is_empty());
        assert!(err.is_eof());

        let (values, err) = values_from("  \n\t ").await;
        assert!(values.is_empty());
        assert!(err.is_eof());
    }

    #[tokio::test]
    async fn unterminated_value_is_unexpected_eof() {
        for input in ["{", "{\"jsonrpc\":\"2.0\",", "[1,2", "\"abc", "tru"] {
            let (_, err) = values_from(input).await;
            assert!(
                matches!(err, ReadError::UnexpectedEof),
                "input {input:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn malformed_input_is_syntax_error() {
        for input in ["{]", "hello", ",", "{\"a\" 1}"] {
            let (_, err) = values_from(input).await;
            assert!(
                matches!(err, ReadError::Syntax(_)),
                "input {input:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn value_split_across_reads() {
        let (client, mut server) = tokio::io::duplex(16);
        let writer = tokio::spawn(async move {
            server.write_all(b"{\"method\":\"abcdefghijklmnop").await.unwrap();
            server.write_all(b"qrstuvwxyz\"}").await.unwrap();
            server.shutdown().await.unwrap();
        });

        let mut reader = JsonReader::new(client);
        let value = reader.next_value().await.unwrap();
        assert_eq!(value.get(), "{\"method\":\"abcdefghijklmnopqrstuvwxyz\"}");
        assert!(reader.next_value().await.unwrap_err().is_eof());
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn write_value_appends_newline_and_flushes() {
        let mut out = Vec::new();
        write_value(&mut out, &serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(out, b"{\"a\":1}\n");
    }
}
