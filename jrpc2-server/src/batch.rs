//! Batch execution
//!
//! A JSON-RPC 2.0 batch is an array of requests answered by an array of
//! responses, in request order, with notifications contributing nothing.
//! Rather than growing a second dispatch path, the server codec rewrites an
//! incoming array into a call of the synthetic method registered here, and
//! this handler re-enters the ordinary dispatcher once per element.
//!
//! Each element runs on a fresh one-shot codec whose input is that single
//! raw sub-request and whose output is captured in memory. A malformed
//! element therefore produces exactly the error response a standalone
//! malformed request would, and a notification element produces no bytes,
//! which is how it gets dropped from the reply array. When every element
//! was a notification the reply array is empty and the outer codec emits
//! nothing at all.

use crate::codec::ServerCodec;
use crate::handler::{Body, Handler, HandlerFuture, Reply, ServiceError};
use crate::server::Server;
use jrpc2_core::error::Error;
use serde_json::value::RawValue;
use std::io::Cursor;

/// Wire-visible name of the synthetic batch method.
pub const BATCH_METHOD: &str = "JSONRPC2.Batch";

/// Handler behind [`BATCH_METHOD`], pre-registered by [`Server::new`].
pub(crate) struct BatchHandler;

impl Handler for BatchHandler {
    fn call(&self, server: Server, body: Body) -> HandlerFuture {
        Box::pin(async move {
            let Body::Batch(requests) = body else {
                return Err(ServiceError::Rpc(Error::invalid_request()));
            };

            let mut replies = Vec::with_capacity(requests.len());
            for request in requests {
                let input = Cursor::new(request.get().as_bytes().to_vec());
                let mut codec = ServerCodec::new(input, Vec::new(), server.clone());
                if let Err(err) = server.serve_request(&mut codec).await {
                    // The sub-codec already answered on its own output; an
                    // element-level failure is part of the reply, not ours.
                    tracing::debug!(error = %err, "batch element rejected");
                }
                let output = codec.into_writer();
                let trimmed = output.trim_ascii();
                if trimmed.is_empty() {
                    continue;
                }
                let reply: Box<RawValue> = serde_json::from_slice(trimmed)
                    .map_err(|err| Error::internal(err.to_string()))?;
                replies.push(reply);
            }
            Ok(Reply::Raw(replies))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_method;

    async fn serve(server: &Server, input: &str) -> String {
        let mut codec = ServerCodec::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            server.clone(),
        );
        let _ = server.serve_request(&mut codec).await;
        String::from_utf8(codec.into_writer()).unwrap()
    }

    fn sum_server() -> Server {
        let server = Server::new();
        server.register(
            "Svc.Sum",
            from_method(|vals: [i64; 2]| async move { Ok(vals[0] + vals[1]) }),
        );
        server
    }

    #[tokio::test]
    async fn replies_preserve_request_order_and_skip_notifications() {
        let out = serve(
            &sum_server(),
            r#"[{"jsonrpc":"2.0","id":1,"method":"Svc.Sum","params":[1,2]},
                {"jsonrpc":"2.0","method":"Svc.Sum","params":[3,4]},
                {"jsonrpc":"2.0","id":2,"method":"Svc.Sum","params":[5,6]}]"#,
        )
        .await;
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"jsonrpc": "2.0", "id": 1, "result": 3},
                {"jsonrpc": "2.0", "id": 2, "result": 11},
            ])
        );
    }

    #[tokio::test]
    async fn all_notifications_emit_nothing() {
        let out = serve(
            &sum_server(),
            r#"[{"jsonrpc":"2.0","method":"Svc.Sum","params":[1,2]},
                {"jsonrpc":"2.0","method":"Svc.Sum","params":[3,4]}]"#,
        )
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_invalid_request_with_null_id() {
        let out = serve(&sum_server(), "[]").await;
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], serde_json::Value::Null);
        assert_eq!(value["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn malformed_element_yields_inline_error_response() {
        let out = serve(
            &sum_server(),
            r#"[{"jsonrpc":"2.0","id":1,"method":"Svc.Sum","params":[1,2]}, {"bogus":true}]"#,
        )
        .await;
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let replies = value.as_array().unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"], 3);
        assert_eq!(replies[1]["id"], serde_json::Value::Null);
        assert_eq!(replies[1]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn sub_request_ids_keep_their_raw_form() {
        let out = serve(
            &sum_server(),
            r#"[{"jsonrpc":"2.0","id":"k-7","method":"Svc.Sum","params":[2,2]}]"#,
        )
        .await;
        assert_eq!(
            out.trim_end(),
            r#"[{"jsonrpc":"2.0","id":"k-7","result":4}]"#
        );
    }

    #[tokio::test]
    async fn nested_batches_recurse() {
        let out = serve(
            &sum_server(),
            r#"[[{"jsonrpc":"2.0","id":1,"method":"Svc.Sum","params":[1,1]}]]"#,
        )
        .await;
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0][0]["result"], 2);
    }
}
