//! HTTP binding for the server
//!
//! Maps one HTTP exchange onto one codec invocation, per the JSON-RPC 2.0
//! HTTP transport convention (POST only, `application/json` both ways):
//!
//! - non-POST methods are `405 Method Not Allowed`,
//! - a missing or wrong `Content-Type` or `Accept` is
//!   `415 Unsupported Media Type` (media-type parameters such as
//!   `; charset=utf-8` are accepted),
//! - a handled request answers `200` with the response document,
//! - a notification, which produces no response document, answers
//!   `204 No Content`.
//!
//! Every response carries `Content-Type: application/json`, including the
//! error statuses. Pipelined requests and GET bindings are not supported.

use crate::codec::ServerCodec;
use crate::server::Server;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use jrpc2_core::error::Error;
use jrpc2_core::wire::{raw_null, ServerResponse};
use serde_json::value::to_raw_value;
use std::convert::Infallible;
use std::io::Cursor;
use tokio::net::TcpListener;

/// The only media type this binding speaks.
pub const APPLICATION_JSON: &str = "application/json";

/// Accept connections on `listener` forever, serving each with
/// [`handle`].
pub async fn serve(listener: TcpListener, server: Server) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let server = server.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle(server.clone(), req));
            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(error = %err, %peer, "http connection error");
            }
        });
    }
}

/// Handle one HTTP exchange: validate the envelope headers, run a one-shot
/// codec over the body, and translate "nothing was written" into the right
/// status.
#[tracing::instrument(skip_all, fields(method = %req.method()))]
pub async fn handle(
    server: Server,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(respond(server, req).await)
}

async fn respond(server: Server, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() != Method::POST {
        return empty_response(StatusCode::METHOD_NOT_ALLOWED);
    }
    if !header_is_json(req.headers(), CONTENT_TYPE) || !header_is_json(req.headers(), ACCEPT) {
        return empty_response(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            return empty_response(StatusCode::BAD_REQUEST);
        }
    };

    let mut codec = ServerCodec::new(Cursor::new(body), Vec::new(), server.clone());
    let outcome = server.serve_request(&mut codec).await;
    let written = codec.into_writer();

    if !written.is_empty() {
        return json_response(StatusCode::OK, Bytes::from(written));
    }
    match outcome {
        // An empty or whitespace-only document reads as immediate end of
        // stream. On a one-shot exchange that is a parse failure, not a
        // shutdown.
        Err(err) if err.is_eof() => json_response(StatusCode::OK, parse_error_body()),
        _ => empty_response(StatusCode::NO_CONTENT),
    }
}

fn header_is_json(headers: &HeaderMap, name: hyper::header::HeaderName) -> bool {
    let value = headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    value
        .split(';')
        .next()
        .is_some_and(|base| base.trim() == APPLICATION_JSON)
}

fn parse_error_body() -> Bytes {
    let id = raw_null();
    let error = to_raw_value(&Error::parse_error()).unwrap_or_else(|_| raw_null());
    let resp = ServerResponse::error(&id, error);
    Bytes::from(serde_json::to_vec(&resp).unwrap_or_default())
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, APPLICATION_JSON)
        .body(Full::new(body))
        .expect("static response parts are valid")
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    json_response(status, Bytes::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_parameters_are_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(header_is_json(&headers, CONTENT_TYPE));

        headers.insert(CONTENT_TYPE, "application/jsonfail".parse().unwrap());
        assert!(!header_is_json(&headers, CONTENT_TYPE));

        headers.insert(CONTENT_TYPE, "text/json".parse().unwrap());
        assert!(!header_is_json(&headers, CONTENT_TYPE));

        assert!(!header_is_json(&headers, ACCEPT));
    }

    #[test]
    fn parse_error_body_is_the_standard_envelope() {
        let body = parse_error_body();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["id"], serde_json::Value::Null);
        assert_eq!(value["error"]["code"], -32700);
        assert_eq!(value["error"]["message"], "Parse error");
    }
}
