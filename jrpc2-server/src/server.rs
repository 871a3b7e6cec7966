//! Dispatcher and serve loops
//!
//! [`Server`] is the host side of the RPC framework: a method registry plus
//! the loops that drive a [`ServerCodec`] over a connection. It is cheaply
//! cloneable (`Arc` inner) so connection tasks, handlers, and the batch
//! engine can all hold it without synchronization overhead.
//!
//! # Dispatch
//!
//! Method names follow the `"Service.Method"` convention. A name that
//! cannot be dispatched is reported to the client through the response's
//! error member with one of the well-known host error strings, which the
//! error model maps back to `-32601 Method not found`:
//!
//! - `rpc: service/method request ill-formed: <name>` for names without a
//!   dot,
//! - `rpc: can't find service <name>` when no method of that service is
//!   registered,
//! - `rpc: can't find method <name>` when the service exists but the
//!   method does not.

use crate::batch::{BatchHandler, BATCH_METHOD};
use crate::codec::{ServeError, ServerCodec};
use crate::handler::{Handler, ServiceError};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

/// JSON-RPC 2.0 server: a method registry and the codec serve loops.
///
/// # Examples
///
/// ```rust
/// use jrpc2_server::{from_method, Server};
///
/// let server = Server::new();
/// server.register(
///     "Arith.Sum",
///     from_method(|vals: [i64; 2]| async move { Ok(vals[0] + vals[1]) }),
/// );
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    methods: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl Server {
    /// Create a server with the batch method pre-registered.
    pub fn new() -> Self {
        let server = Self {
            inner: Arc::new(Inner {
                methods: RwLock::new(HashMap::new()),
            }),
        };
        server.register(BATCH_METHOD, Box::new(BatchHandler));
        server
    }

    /// Register a handler under a service-method name, replacing any
    /// previous registration.
    pub fn register(&self, method: impl Into<String>, handler: Box<dyn Handler>) {
        let mut methods = self.inner.methods.write().expect("method registry poisoned");
        methods.insert(method.into(), Arc::from(handler));
    }

    /// Whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        let methods = self.inner.methods.read().expect("method registry poisoned");
        methods.contains_key(method)
    }

    fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>> {
        let methods = self.inner.methods.read().expect("method registry poisoned");
        methods.get(method).cloned()
    }

    fn dispatch_failure(&self, method: &str) -> String {
        let Some((service, _)) = method.split_once('.') else {
            return format!("rpc: service/method request ill-formed: {method}");
        };
        let methods = self.inner.methods.read().expect("method registry poisoned");
        let service_known = methods
            .keys()
            .any(|name| name.split_once('.').is_some_and(|(s, _)| s == service));
        if service_known {
            format!("rpc: can't find method {method}")
        } else {
            format!("rpc: can't find service {method}")
        }
    }

    /// Read, dispatch, and answer exactly one request on `codec`.
    ///
    /// Body and handler failures are reported to the client in the response
    /// and return `Ok`; only envelope and transport failures propagate, and
    /// those close the connection.
    pub async fn serve_request<R, W>(
        &self,
        codec: &mut ServerCodec<R, W>,
    ) -> Result<(), ServeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let header = codec.read_request_header().await?;
        tracing::debug!(method = %header.method, seq = header.seq, "dispatching request");

        let body = match codec.read_request_body(&header) {
            Ok(body) => body,
            Err(err) => {
                return codec.write_response(&header, Some(err.to_string()), None).await;
            }
        };

        let outcome = match self.lookup(&header.method) {
            Some(handler) => handler.call(self.clone(), body).await,
            None => Err(ServiceError::Message(self.dispatch_failure(&header.method))),
        };
        match outcome {
            Ok(reply) => codec.write_response(&header, None, Some(reply)).await,
            Err(err) => {
                tracing::debug!(method = %header.method, error = %err, "handler failed");
                codec.write_response(&header, Some(err.to_string()), None).await
            }
        }
    }

    /// Serve `codec` until the peer hangs up or the stream turns invalid.
    pub async fn serve_codec<R, W>(&self, mut codec: ServerCodec<R, W>)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            match self.serve_request(&mut codec).await {
                Ok(()) => {}
                Err(err) if err.is_eof() => {
                    tracing::debug!("connection closed");
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "closing connection");
                    return;
                }
            }
        }
    }

    /// Serve one bidirectional byte stream (split into halves) until it
    /// closes.
    #[tracing::instrument(skip_all)]
    pub async fn serve_conn<R, W>(&self, reader: R, writer: W)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.serve_codec(ServerCodec::new(reader, writer, self.clone()))
            .await;
    }

    /// Accept TCP connections forever, spawning one serve task each.
    pub async fn serve_listener(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(%peer, "accepted connection");
            let server = self.clone();
            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                server.serve_conn(reader, writer).await;
            });
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
