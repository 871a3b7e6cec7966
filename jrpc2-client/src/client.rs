//! JSON-RPC 2.0 client
//!
//! [`Client`] multiplexes concurrent calls over one connection. Each call
//! registers a oneshot slot keyed by its sequence number, writes its
//! request through the mutex-guarded codec write half, and awaits the slot;
//! a dedicated receive loop owns the codec read half and completes slots as
//! responses arrive, in whatever order the server produces them.
//!
//! # Shutdown
//!
//! When the stream signals end-of-file the receive loop fails every pending
//! call and marks the client shut down: [`ClientError::Shutdown`] if
//! [`Client::close`] was called first, [`ClientError::UnexpectedEof`] if
//! the peer vanished underneath live calls. Calls made after that point
//! fail immediately with `Shutdown`.
//!
//! # Cloning
//!
//! `Client` is cheaply cloneable; clones share the connection, the pending
//! table, and the sequence counter.

use crate::codec::{self, ClientCodec, ClientReadHalf, ClientWriteHalf, ReadHeaderError};
use crate::http::HttpConn;
use jrpc2_core::error::Error;
use jrpc2_core::wire::NOTIFY_SEQ;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;

/// Client-side call failure.
#[derive(Debug, Clone, ThisError)]
pub enum ClientError {
    /// The connection was closed on purpose.
    #[error("connection is shut down")]
    Shutdown,
    /// The connection died while calls were still pending.
    #[error("unexpected EOF")]
    UnexpectedEof,
    /// The server answered this call with an error. The payload is the
    /// error object's canonical JSON; [`server_error`] recovers the
    /// structured form.
    #[error("{0}")]
    Remote(String),
    /// A local failure: encoding, transport, or response validation.
    #[error(transparent)]
    Rpc(#[from] Error),
}

/// Convert a call failure into the structured wire error.
///
/// Check for [`ClientError::Shutdown`] and [`ClientError::UnexpectedEof`]
/// first; those are connection states, not wire errors.
///
/// # Panics
///
/// Panics when the failure does not contain a JSON-RPC error object. That
/// only happens when the conversion is applied to a connection-state error,
/// which is a bug in the caller.
pub fn server_error(err: &ClientError) -> Error {
    match err {
        ClientError::Rpc(err) => err.clone(),
        other => match Error::from_error_string(&other.to_string()) {
            Ok(err) => err,
            Err(parse) => panic!("not a jsonrpc2 error: {parse} ({other})"),
        },
    }
}

type CallOutcome = Result<Box<RawValue>, ClientError>;

/// Pending-call table shared between callers and the receive loop.
///
/// `None` means the client is shut down and no further calls may register.
#[derive(Clone)]
struct PendingCalls {
    slots: Arc<Mutex<Option<HashMap<u64, oneshot::Sender<CallOutcome>>>>>,
}

impl PendingCalls {
    fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Some(HashMap::new()))),
        }
    }

    fn register(&self, seq: u64) -> Result<oneshot::Receiver<CallOutcome>, ClientError> {
        let mut slots = self.slots.lock().expect("pending calls poisoned");
        match slots.as_mut() {
            Some(slots) => {
                let (tx, rx) = oneshot::channel();
                slots.insert(seq, tx);
                Ok(rx)
            }
            None => Err(ClientError::Shutdown),
        }
    }

    fn discard(&self, seq: u64) {
        let mut slots = self.slots.lock().expect("pending calls poisoned");
        if let Some(slots) = slots.as_mut() {
            slots.remove(&seq);
        }
    }

    fn complete(&self, seq: u64, outcome: CallOutcome) {
        let slot = {
            let mut slots = self.slots.lock().expect("pending calls poisoned");
            slots.as_mut().and_then(|slots| slots.remove(&seq))
        };
        if let Some(tx) = slot {
            let _ = tx.send(outcome);
        }
    }

    /// Fail everything still pending and refuse future registrations.
    fn close(&self, err: ClientError) {
        let drained = {
            let mut slots = self.slots.lock().expect("pending calls poisoned");
            slots.take()
        };
        if let Some(slots) = drained {
            for (_, tx) in slots {
                let _ = tx.send(Err(err.clone()));
            }
        }
    }
}

struct Shared {
    writer: tokio::sync::Mutex<ClientWriteHalf>,
    calls: PendingCalls,
    seq: AtomicU64,
    closing: AtomicBool,
}

/// JSON-RPC 2.0 client over any bidirectional byte stream.
///
/// # Examples
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = jrpc2_client::Client::dial("127.0.0.1:8001").await?;
/// let sum: i64 = client.call("Arith.Sum", [3, 5]).await?;
/// assert_eq!(sum, 8);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Build a client over a split byte stream and start its receive loop.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        let (read_half, write_half) = ClientCodec::new(reader, writer).split();
        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(write_half),
            calls: PendingCalls::new(),
            seq: AtomicU64::new(0),
            closing: AtomicBool::new(false),
        });
        tokio::spawn(receive_loop(read_half, Arc::clone(&shared)));
        Self { shared }
    }

    /// Connect over TCP.
    pub async fn dial(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }

    /// Connect over the HTTP binding; each request becomes one POST to
    /// `url`.
    pub fn connect_http(url: impl Into<String>) -> Self {
        let (reader, writer) = HttpConn::connect(url.into());
        Self::new(reader, writer)
    }

    /// Call a method and decode its result.
    #[tracing::instrument(skip(self, params))]
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let raw = self.call_raw(method, params).await?;
        codec::decode_reply(&raw).map_err(ClientError::Rpc)
    }

    /// Call a method and return the raw result.
    pub async fn call_raw<P: Serialize>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Box<RawValue>, ClientError> {
        let params =
            serde_json::to_value(params).map_err(|err| Error::internal(err.to_string()))?;
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        let rx = self.shared.calls.register(seq)?;

        {
            let mut writer = self.shared.writer.lock().await;
            if let Err(err) = writer.write_request(seq, method, &params).await {
                self.shared.calls.discard(seq);
                return Err(ClientError::Rpc(err));
            }
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Shutdown),
        }
    }

    /// Send a notification. No reply ever arrives, so errors can only come
    /// from the encoder or the transport.
    #[tracing::instrument(skip(self, params))]
    pub async fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<(), ClientError> {
        let params =
            serde_json::to_value(params).map_err(|err| Error::internal(err.to_string()))?;
        let mut writer = self.shared.writer.lock().await;
        writer
            .write_request(NOTIFY_SEQ, method, &params)
            .await
            .map_err(ClientError::Rpc)
    }

    /// Shut down the write side. Pending calls fail with
    /// [`ClientError::Shutdown`] once the receive loop observes the close.
    pub async fn close(&self) -> io::Result<()> {
        self.shared.closing.store(true, Ordering::SeqCst);
        let mut writer = self.shared.writer.lock().await;
        writer.shutdown().await
    }
}

async fn receive_loop(mut codec: ClientReadHalf, shared: Arc<Shared>) {
    let err = loop {
        match codec.read_response_header().await {
            Ok(header) => {
                let result = codec.read_response_body();
                let outcome = match header.error {
                    Some(message) => Err(ClientError::Remote(message)),
                    None => match result {
                        Some(raw) => Ok(raw),
                        None => Err(ClientError::Rpc(Error::internal("response without result"))),
                    },
                };
                shared.calls.complete(header.seq, outcome);
            }
            Err(ReadHeaderError::Eof) => {
                break if shared.closing.load(Ordering::SeqCst) {
                    ClientError::Shutdown
                } else {
                    ClientError::UnexpectedEof
                };
            }
            Err(ReadHeaderError::Rpc(err)) => break ClientError::Rpc(err),
        }
    };
    tracing::debug!(error = %err, "receive loop finished");
    shared.calls.close(err);
}
