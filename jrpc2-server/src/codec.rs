//! Server-side JSON-RPC 2.0 codec
//!
//! [`ServerCodec`] translates between the byte stream and the host
//! framework's request/response model:
//!
//! - incoming envelopes are validated and mapped onto `(sequence, method)`
//!   headers the dispatcher understands,
//! - arbitrary JSON request ids (string, number, null) are parked in an id
//!   translation table keyed by an internally assigned sequence number,
//!   because the host framework only works with `u64` ids and the wire id
//!   bytes must be echoed verbatim,
//! - outgoing replies are framed as response envelopes, with notifications
//!   (requests that carried no id) producing no bytes at all.
//!
//! A JSON array at the top level is a batch: the codec rewrites it into a
//! call of the synthetic [`BATCH_METHOD`](crate::BATCH_METHOD) carrying the
//! raw array as params, so batches flow through the ordinary dispatch path.

use crate::batch::BATCH_METHOD;
use crate::handler::{Body, Reply, ServiceError};
use crate::server::Server;
use jrpc2_core::error::Error;
use jrpc2_core::frame::{self, JsonReader, ReadError};
use jrpc2_core::wire::{self, raw_null, ServerRequest, ServerResponse};
use serde_json::value::{to_raw_value, RawValue};
use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncWrite};

/// Decoded request header in the host framework's terms.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    /// Service-method name, `"Service.Method"` by convention.
    pub method: String,
    /// Internally assigned sequence number; never appears on the wire.
    pub seq: u64,
}

/// Why serving a request (or the connection) stopped.
#[derive(Debug, ThisError)]
pub enum ServeError {
    /// Reading the next envelope failed; [`ReadError::Eof`] is the clean
    /// connection-close case.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// The envelope failed strict validation. A `-32600` response has
    /// already been written; the decode loop must shut down.
    #[error("invalid request")]
    InvalidRequest,
    /// A response was requested for a sequence number with no table entry.
    #[error("invalid sequence number in response")]
    InvalidSequence,
    /// Encoding a reply value failed.
    #[error("encoding response: {0}")]
    Encode(#[source] serde_json::Error),
    /// Writing to the transport failed.
    #[error("writing response: {0}")]
    Write(#[source] io::Error),
}

impl ServeError {
    /// Whether the connection ended cleanly.
    pub fn is_eof(&self) -> bool {
        matches!(self, ServeError::Read(err) if err.is_eof())
    }
}

/// The id slot for one in-flight request.
#[derive(Debug)]
enum IdSlot {
    /// The request carried no id; no response may be written.
    Notification,
    /// The raw id bytes to echo in the response (`null` included).
    Id(Box<RawValue>),
}

#[derive(Debug, Default)]
struct IdTable {
    seq: u64,
    pending: HashMap<u64, IdSlot>,
}

/// Server-side codec over one bidirectional byte stream.
pub struct ServerCodec<R, W> {
    reader: JsonReader<R>,
    writer: W,
    server: Server,
    /// Raw params staged between the header and body reads.
    staged_params: Option<Box<RawValue>>,
    /// Sequence counter and id translation table. The lock is held only
    /// across table operations, never across I/O.
    ids: Mutex<IdTable>,
}

impl<R, W> ServerCodec<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Build a codec over a split byte stream, dispatching batch re-entry
    /// through `server`.
    pub fn new(reader: R, writer: W, server: Server) -> Self {
        Self {
            reader: JsonReader::new(reader),
            writer,
            server,
            staged_params: None,
            ids: Mutex::new(IdTable::default()),
        }
    }

    /// Decode the next request envelope.
    ///
    /// Assigns the sequence number, parks the raw id, and stages the params
    /// for [`read_request_body`](Self::read_request_body). On a validation
    /// failure a `-32600` response with a null id is written first; on a
    /// JSON syntax failure (malformed or unterminated input) a `-32700`
    /// response is written first. Either way the error propagates so the
    /// serve loop closes the connection.
    pub async fn read_request_header(&mut self) -> Result<RequestHeader, ServeError> {
        let raw = match self.reader.next_value().await {
            Ok(raw) => raw,
            Err(err) => {
                if matches!(err, ReadError::Syntax(_) | ReadError::UnexpectedEof) {
                    self.write_failure(&Error::parse_error()).await;
                }
                return Err(err.into());
            }
        };

        let req = if raw.get().starts_with('[') {
            // Batch: the whole array becomes the params of the synthetic
            // batch method, answered under a null id.
            ServerRequest {
                jsonrpc: wire::VERSION.to_owned(),
                method: BATCH_METHOD.to_owned(),
                params: Some(raw),
                id: Some(raw_null()),
            }
        } else {
            match wire::parse_server_request(&raw) {
                Ok(req) => req,
                Err(err) => {
                    self.write_failure(&err).await;
                    return Err(ServeError::InvalidRequest);
                }
            }
        };

        let seq = {
            let mut ids = self.ids.lock().expect("id table lock poisoned");
            ids.seq += 1;
            let slot = match req.id {
                Some(id) => IdSlot::Id(id),
                None => IdSlot::Notification,
            };
            let seq = ids.seq;
            ids.pending.insert(seq, slot);
            seq
        };
        self.staged_params = req.params;

        Ok(RequestHeader {
            method: req.method,
            seq,
        })
    }

    /// Take the staged request body for the handler layer.
    ///
    /// For the batch method the raw array is parsed into its elements here;
    /// an empty batch is `-32600`. An error return is reported to the
    /// client through the response's error member, keyed to the request id.
    pub fn read_request_body(&mut self, header: &RequestHeader) -> Result<Body, ServiceError> {
        let Some(params) = self.staged_params.take() else {
            return Ok(Body::None);
        };
        if header.method == BATCH_METHOD {
            let requests: Vec<Box<RawValue>> = serde_json::from_str(params.get())
                .map_err(|err| Error::invalid_params(err.to_string()))?;
            if requests.is_empty() {
                return Err(Error::invalid_request().into());
            }
            Ok(Body::Batch(requests))
        } else {
            Ok(Body::Params(params))
        }
    }

    /// Frame and write the response for `header`.
    ///
    /// Consumes the id table entry; a missing entry is an error. Special
    /// cases, in order: batch replies emit the raw array (or nothing when
    /// every element was a notification); notification slots emit nothing;
    /// an error string framed as `{...}` is trusted as a preformed error
    /// object and passed through verbatim; any other error string gets a
    /// code auto-detected; an absent result becomes the `null` sentinel.
    pub async fn write_response(
        &mut self,
        header: &RequestHeader,
        error: Option<String>,
        reply: Option<Reply>,
    ) -> Result<(), ServeError> {
        let slot = {
            let mut ids = self.ids.lock().expect("id table lock poisoned");
            ids.pending.remove(&header.seq)
        }
        .ok_or(ServeError::InvalidSequence)?;

        if header.method == BATCH_METHOD {
            if let Some(Reply::Raw(replies)) = &reply {
                if replies.is_empty() {
                    return Ok(());
                }
                return frame::write_value(&mut self.writer, replies)
                    .await
                    .map_err(ServeError::Write);
            }
        }

        let id = match slot {
            IdSlot::Notification => return Ok(()),
            IdSlot::Id(id) => id,
        };

        let resp = match error {
            None => {
                let result = match reply {
                    Some(Reply::Value(value)) => {
                        to_raw_value(&value).map_err(ServeError::Encode)?
                    }
                    Some(Reply::Raw(_)) | None => raw_null(),
                };
                ServerResponse::result(&id, result)
            }
            Some(message) => {
                // Trusting our own methods: normal errors never look like a
                // JSON object, so one that does is passed through verbatim.
                let framed = message.starts_with('{') && message.ends_with('}');
                let raw = if framed {
                    RawValue::from_string(message.clone()).ok()
                } else {
                    None
                };
                let raw = match raw {
                    Some(raw) => raw,
                    None => to_raw_value(&Error::from_message(message))
                        .map_err(ServeError::Encode)?,
                };
                ServerResponse::error(&id, raw)
            }
        };
        frame::write_value(&mut self.writer, &resp)
            .await
            .map_err(ServeError::Write)
    }

    /// Consume the codec, returning the write side. The batch engine and
    /// the HTTP handler use this to collect the bytes a one-shot codec
    /// produced.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Best-effort error response with a null id, written before the codec
    /// shuts down. Write failures are ignored; the connection is going away
    /// regardless.
    async fn write_failure(&mut self, err: &Error) {
        let id = raw_null();
        if let Ok(raw) = to_raw_value(err) {
            let resp = ServerResponse::error(&id, raw);
            if let Err(write_err) = frame::write_value(&mut self.writer, &resp).await {
                tracing::debug!(error = %write_err, "failed to write error response");
            }
        }
    }
}
