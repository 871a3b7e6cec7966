//! Client-side JSON-RPC 2.0 codec
//!
//! [`ClientCodec`] frames outgoing requests and validates incoming
//! responses. It splits into a write half and a read half so the RPC client
//! can drive them from different tasks (one writer behind a lock, one
//! dedicated receive loop), the same shape the connection takes everywhere
//! else in this workspace.
//!
//! # The pending method table
//!
//! JSON-RPC responses carry the request id but not the method name, while
//! the host framework wants both back. The codec records `id -> method` in
//! a table shared by the two halves when a request is written, and removes
//! the entry when the matching response header is decoded. The mutex is
//! held only across table operations.
//!
//! # Notifications
//!
//! A notification travels the same write path as a call, signalled by the
//! sentinel sequence [`NOTIFY_SEQ`]: the codec omits the `id` member and
//! skips the table insert, so no reply is ever expected.

use jrpc2_core::error::Error;
use jrpc2_core::frame::{self, JsonReader, ReadError};
use jrpc2_core::wire::{self, ClientRequest, NOTIFY_SEQ, VERSION};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

type BoxRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxWrite = Box<dyn AsyncWrite + Send + Unpin>;
type PendingMethods = Arc<Mutex<HashMap<u64, String>>>;

/// Decoded response header in the host framework's terms.
#[derive(Debug)]
pub struct ResponseHeader {
    /// Sequence number of the call this response answers.
    pub seq: u64,
    /// Method name recovered from the pending table; empty when the
    /// response matches no pending call.
    pub method: String,
    /// Error string (the error object's canonical JSON), `None` on
    /// success.
    pub error: Option<String>,
}

/// Failure modes of [`ClientReadHalf::read_response_header`].
#[derive(Debug, ThisError)]
pub enum ReadHeaderError {
    /// The stream ended cleanly. Propagated unchanged so the host can
    /// classify shutdown.
    #[error("end of stream")]
    Eof,
    /// Anything else: transport failures, malformed JSON, and envelopes
    /// that fail validation all become structured errors that fail every
    /// pending call.
    #[error(transparent)]
    Rpc(Error),
}

/// Client codec over one bidirectional byte stream.
pub struct ClientCodec {
    read: ClientReadHalf,
    write: ClientWriteHalf,
}

impl ClientCodec {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        let pending: PendingMethods = Arc::new(Mutex::new(HashMap::new()));
        Self {
            read: ClientReadHalf {
                reader: JsonReader::new(Box::new(reader) as BoxRead),
                pending: Arc::clone(&pending),
                staged_result: None,
            },
            write: ClientWriteHalf {
                writer: Box::new(writer) as BoxWrite,
                pending,
            },
        }
    }

    /// Split into independently owned halves sharing the pending table.
    pub fn split(self) -> (ClientReadHalf, ClientWriteHalf) {
        (self.read, self.write)
    }
}

/// Write half: frames requests.
pub struct ClientWriteHalf {
    writer: BoxWrite,
    pending: PendingMethods,
}

impl ClientWriteHalf {
    /// Frame and send one request.
    ///
    /// Params must serialize to a JSON array or object. JSON null (from
    /// `None` or a nil-like value) and empty collections omit the `params`
    /// member entirely; any other kind fails locally with `-32603`.
    /// For non-notifications the pending table entry is registered before
    /// the bytes go out, so the response can never race the registration.
    pub async fn write_request(
        &mut self,
        seq: u64,
        method: &str,
        params: &Value,
    ) -> Result<(), Error> {
        let params = match params {
            Value::Null => None,
            Value::Array(items) => (!items.is_empty()).then_some(params),
            Value::Object(fields) => (!fields.is_empty()).then_some(params),
            other => {
                return Err(Error::internal(format!(
                    "unsupported param type: {}",
                    kind_name(other)
                )))
            }
        };

        let notification = seq == NOTIFY_SEQ;
        if !notification {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.insert(seq, method.to_owned());
        }

        let req = ClientRequest {
            jsonrpc: VERSION,
            method,
            params,
            id: (!notification).then_some(seq),
        };
        frame::write_value(&mut self.writer, &req)
            .await
            .map_err(|err| Error::internal(err.to_string()))
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

/// Read half: validates responses.
pub struct ClientReadHalf {
    reader: JsonReader<BoxRead>,
    pending: PendingMethods,
    staged_result: Option<Box<RawValue>>,
}

impl ClientReadHalf {
    /// Decode and validate the next response header.
    ///
    /// On success the result raw is staged for
    /// [`read_response_body`](Self::read_response_body), the pending table
    /// entry is consumed, and the header carries the method name and the
    /// error string (if any). A response whose id is null and whose error
    /// is set surfaces that error directly: the server reported a failure
    /// it could not attribute to any request.
    pub async fn read_response_header(&mut self) -> Result<ResponseHeader, ReadHeaderError> {
        let raw = match self.reader.next_value().await {
            Ok(raw) => raw,
            Err(ReadError::Eof) => return Err(ReadHeaderError::Eof),
            Err(err) => return Err(ReadHeaderError::Rpc(Error::internal(err.to_string()))),
        };

        let resp = wire::parse_client_response(&raw).map_err(ReadHeaderError::Rpc)?;
        let seq = resp.id.ok_or_else(|| {
            ReadHeaderError::Rpc(Error::internal(format!("bad response: {}", raw.get())))
        })?;

        let method = {
            let mut pending = self.pending.lock().expect("pending table poisoned");
            pending.remove(&seq).unwrap_or_default()
        };
        self.staged_result = resp.result;

        Ok(ResponseHeader {
            seq,
            method,
            error: resp.error.map(|err| err.to_string()),
        })
    }

    /// Take the staged result raw; `None` when the response carried an
    /// error. Decoding into the caller's type is [`decode_reply`]'s job.
    pub fn read_response_body(&mut self) -> Option<Box<RawValue>> {
        self.staged_result.take()
    }
}

/// Decode a staged result into the caller's type.
///
/// A mismatch fails only the call the result belongs to; the error carries
/// a `data` member saying so, since the connection and every other pending
/// call remain usable.
pub fn decode_reply<T: DeserializeOwned>(raw: &RawValue) -> Result<T, Error> {
    serde_json::from_str(raw.get()).map_err(|err| {
        let note = serde_json::to_value(Error::internal("other pending calls are unaffected"))
            .unwrap_or(Value::Null);
        Error::with_data(jrpc2_core::error::INTERNAL_ERROR, err.to_string(), note)
    })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
