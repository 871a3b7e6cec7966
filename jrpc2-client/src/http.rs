//! HTTP connection for the client
//!
//! The codec wants a streaming connection: write some bytes, then read
//! response bytes whenever the server gets around to producing them. HTTP
//! wants discrete request/response exchanges. [`HttpConn`] bridges the two
//! by buffering each outgoing message, launching the POST in a background
//! task, and pushing whatever comes back onto a bounded ready queue that
//! the read half drains.
//!
//! Backpressure comes from the queue bound ([`READY_QUEUE_CAPACITY`]): a
//! worker holding a response blocks until the reader catches up. In-flight
//! exchanges may complete in any order; nothing here preserves ordering,
//! because the codec correlates responses by id.
//!
//! Failed exchanges (transport errors, wrong content type, unexpected
//! status) do not kill the connection. The worker synthesizes a valid
//! `-32603` error response echoing the original request id and enqueues
//! it, so exactly the affected call fails. A failed notification has no id
//! to answer and is dropped silently.

use bytes::Bytes;
use jrpc2_core::error::Error;
use jrpc2_core::wire::VERSION;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

/// How many ready response bodies may queue up before HTTP workers block.
pub const READY_QUEUE_CAPACITY: usize = 16;

const APPLICATION_JSON: &str = "application/json";

/// Factory for the HTTP read/write half pair.
pub struct HttpConn;

impl HttpConn {
    /// Build the connection halves for POSTs against `url`.
    pub fn connect(url: String) -> (HttpReadHalf, HttpWriteHalf) {
        let (ready_tx, ready_rx) = mpsc::channel(READY_QUEUE_CAPACITY);
        let read = HttpReadHalf {
            ready: ready_rx,
            current: None,
        };
        let write = HttpWriteHalf {
            url: Arc::from(url),
            http: reqwest::Client::new(),
            ready: Some(ready_tx),
            buf: Vec::new(),
        };
        (read, write)
    }
}

/// Read half: serves queued response bodies as one continuous byte stream.
pub struct HttpReadHalf {
    ready: mpsc::Receiver<Bytes>,
    current: Option<Bytes>,
}

impl AsyncRead for HttpReadHalf {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.current.take() {
                Some(mut current) if !current.is_empty() => {
                    let n = current.len().min(buf.remaining());
                    buf.put_slice(&current.split_to(n));
                    if !current.is_empty() {
                        this.current = Some(current);
                    }
                    return Poll::Ready(Ok(()));
                }
                _ => {}
            }
            match this.ready.poll_recv(cx) {
                Poll::Ready(Some(body)) => this.current = Some(body),
                // All senders gone: the write half shut down and no worker
                // is in flight. That is end of stream.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Write half: one buffered message per flush becomes one POST.
pub struct HttpWriteHalf {
    url: Arc<str>,
    http: reqwest::Client,
    ready: Option<mpsc::Sender<Bytes>>,
    buf: Vec<u8>,
}

impl AsyncWrite for HttpWriteHalf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.buf.is_empty() {
            return Poll::Ready(Ok(()));
        }
        let body = Bytes::from(mem::take(&mut this.buf));
        match &this.ready {
            Some(ready) => {
                tokio::spawn(round_trip(
                    this.http.clone(),
                    Arc::clone(&this.url),
                    body,
                    ready.clone(),
                ));
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is shut down",
            ))),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Dropping the sender lets the read half reach end of stream once
        // in-flight workers finish.
        self.get_mut().ready = None;
        Poll::Ready(Ok(()))
    }
}

/// Run one HTTP exchange and deliver its outcome to the ready queue.
#[tracing::instrument(skip_all, fields(url = %url))]
async fn round_trip(http: reqwest::Client, url: Arc<str>, body: Bytes, ready: mpsc::Sender<Bytes>) {
    let result = http
        .post(&*url)
        .header(CONTENT_TYPE, APPLICATION_JSON)
        .header(ACCEPT, APPLICATION_JSON)
        .body(body.clone())
        .send()
        .await;

    let failure = match result {
        Ok(resp) => {
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_owned();
            if !is_json_media_type(&content_type) {
                format!("bad HTTP Content-Type: {content_type}")
            } else if resp.status() == StatusCode::OK {
                match resp.bytes().await {
                    Ok(bytes) => {
                        let _ = ready.send(bytes).await;
                        return;
                    }
                    Err(err) => err.to_string(),
                }
            } else if resp.status() == StatusCode::NO_CONTENT
                || resp.status() == StatusCode::ACCEPTED
            {
                return;
            } else {
                format!("bad HTTP Status: {}", resp.status())
            }
        }
        Err(err) => err.to_string(),
    };
    tracing::debug!(error = %failure, "http exchange failed");

    // Synthesize a response so exactly the affected call fails. The
    // original request bytes tell us which id to echo; a notification has
    // none and gets no reply.
    #[derive(Deserialize)]
    struct RequestId {
        id: Option<u64>,
    }
    let id = match serde_json::from_slice::<RequestId>(&body) {
        Ok(RequestId { id: Some(id) }) => Some(id),
        Ok(RequestId { id: None }) => return,
        Err(_) => None,
    };
    let resp = serde_json::json!({
        "jsonrpc": VERSION,
        "id": id,
        "error": Error::internal(failure),
    });
    match serde_json::to_vec(&resp) {
        Ok(bytes) => {
            let _ = ready.send(Bytes::from(bytes)).await;
        }
        Err(err) => tracing::warn!(error = %err, "failed to synthesize error response"),
    }
}

fn is_json_media_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|base| base.trim() == APPLICATION_JSON)
}
