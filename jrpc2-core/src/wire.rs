//! JSON-RPC 2.0 envelope types and structural validators
//!
//! This module defines the four wire envelopes (client request, client
//! response, server request, server response) and the validation rules the
//! codecs apply to incoming messages.
//!
//! # Raw JSON
//!
//! Ids, params, and results travel as [`serde_json::value::RawValue`] so the
//! exact bytes the peer sent survive translation. A client may use any
//! string, number, or null as a request id; the server must echo those bytes
//! verbatim in the response. The three-byte literal `null` doubles as the
//! id placeholder and as the explicit "absent result" marker, built by
//! [`raw_null`].
//!
//! # Strictness
//!
//! The validators reject anything the specification does not allow rather
//! than guessing: wrong key counts, a version other than `"2.0"`, params
//! that are not an array or object, ids that are booleans or containers.
//! Rejections carry the standard error codes so the codecs can answer with
//! the right wire error.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// The protocol version string, present in every envelope.
pub const VERSION: &str = "2.0";

/// Sentinel sequence number marking a notification on the client write path.
///
/// Passing this value through the ordinary request path tells the codec to
/// omit the `id` member and skip the pending-call registration.
pub const NOTIFY_SEQ: u64 = u64::MAX;

/// The raw JSON `null` literal.
pub fn raw_null() -> Box<RawValue> {
    RawValue::from_string("null".to_owned()).expect("null is valid JSON")
}

/// Whether a raw value is the JSON `null` literal.
pub fn is_raw_null(raw: &RawValue) -> bool {
    raw.get() == "null"
}

/// Outgoing request as framed by the client codec.
///
/// `params` and `id` are omitted entirely when absent; an id-less request is
/// a notification and must never be answered.
#[derive(Debug, Serialize)]
pub struct ClientRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// Incoming response as decoded by the client codec.
///
/// The id domain is what this side produced: a `u64` sequence number, or
/// null for server-initiated failures that could not name a request. The
/// result stays raw so the caller decides the concrete type.
#[derive(Debug, Deserialize)]
pub struct ClientResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<Box<RawValue>>,
    pub error: Option<Error>,
}

/// Validate and decode one incoming response.
///
/// Rules, each rejected as `-32603 "bad response: <raw>"`:
///
/// - the top level is an object with exactly three keys,
/// - `jsonrpc` and `id` are present and the version is `"2.0"`,
/// - exactly one of `result` / `error` is set, where a present-but-null
///   `result` counts as the null sentinel,
/// - an `error` is an object with `code` and `message` and nothing else
///   except an optional `data`.
///
/// A null id with an error set means the server reported a failure it could
/// not attribute to any request; the error itself is surfaced as the
/// failure.
pub fn parse_client_response(raw: &RawValue) -> Result<ClientResponse, Error> {
    let bad = || Error::internal(format!("bad response: {}", raw.get()));

    let fields: Map<String, Value> = serde_json::from_str(raw.get()).map_err(|_| bad())?;
    if fields.len() != 3 {
        return Err(bad());
    }
    if !fields.contains_key("jsonrpc") || !fields.contains_key("id") {
        return Err(bad());
    }

    let mut resp: ClientResponse = serde_json::from_str(raw.get()).map_err(|_| bad())?;
    if resp.jsonrpc != VERSION {
        return Err(bad());
    }
    if fields.contains_key("result") && resp.result.is_none() {
        resp.result = Some(raw_null());
    }
    if resp.result.is_some() == resp.error.is_some() {
        return Err(bad());
    }
    if resp.error.is_some() {
        let Some(Value::Object(error_fields)) = fields.get("error") else {
            return Err(bad());
        };
        if !error_fields.contains_key("code") || !error_fields.contains_key("message") {
            return Err(bad());
        }
        match error_fields.len() {
            2 => {}
            3 if error_fields.contains_key("data") => {}
            _ => return Err(bad()),
        }
    }
    if matches!(fields.get("id"), Some(Value::Null)) {
        if let Some(err) = resp.error {
            return Err(err);
        }
        return Err(bad());
    }

    Ok(resp)
}

/// Incoming request as decoded by the server codec.
///
/// `params` and `id` stay raw: params are handed to the handler layer
/// untouched, and the id bytes are stored aside so the response can echo
/// them exactly. A request that carried no id decodes with `id: None` and
/// is a notification; a request that carried a JSON null id decodes with
/// the raw `null` sentinel and is answered with `"id":null`.
#[derive(Debug, Deserialize)]
pub struct ServerRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    pub params: Option<Box<RawValue>>,
    pub id: Option<Box<RawValue>>,
}

/// Strictly validate and decode one incoming request envelope.
///
/// Rules, each rejected as `-32600 Invalid request`:
///
/// - the top level is an object,
/// - `jsonrpc` and `method` are present (and not null) and the version is
///   exactly `"2.0"`,
/// - the key count is 2, 3 with exactly one of `id` / `params`, or 4 with
///   both,
/// - `params`, when present, is an array or object,
/// - `id`, when present, is a string, number, or null. Booleans and
///   containers make correlation ambiguous and are refused.
pub fn parse_server_request(raw: &RawValue) -> Result<ServerRequest, Error> {
    let bad = || Error::invalid_request();

    let fields: Map<String, Value> = serde_json::from_str(raw.get()).map_err(|_| bad())?;
    let non_null = |key: &str| matches!(fields.get(key), Some(value) if !value.is_null());
    if !non_null("jsonrpc") || !non_null("method") {
        return Err(bad());
    }
    let has_id = fields.contains_key("id");
    let has_params = fields.contains_key("params");
    match fields.len() {
        2 => {}
        3 if has_id != has_params => {}
        4 if has_id && has_params => {}
        _ => return Err(bad()),
    }

    let mut req: ServerRequest = serde_json::from_str(raw.get()).map_err(|_| bad())?;
    if req.jsonrpc != VERSION {
        return Err(bad());
    }
    if has_params {
        match req.params.as_deref() {
            Some(params) => match params.get().as_bytes().first() {
                Some(b'[') | Some(b'{') => {}
                _ => return Err(bad()),
            },
            // "params": null
            None => return Err(bad()),
        }
    }
    if has_id {
        match req.id.as_deref() {
            Some(id) => match id.get().as_bytes().first() {
                Some(b't') | Some(b'f') | Some(b'{') | Some(b'[') | None => return Err(bad()),
                _ => {}
            },
            // A JSON null id is preserved, not dropped: the response must
            // carry "id":null.
            None => req.id = Some(raw_null()),
        }
    }

    Ok(req)
}

/// Outgoing response as framed by the server codec.
///
/// The id is the raw bytes the client sent. Exactly one of `result` /
/// `error` is populated by the constructors; both are pre-rendered raw JSON
/// so trusted error passthrough and the null sentinel share one shape.
#[derive(Debug, Serialize)]
pub struct ServerResponse<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a RawValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Box<RawValue>>,
}

impl<'a> ServerResponse<'a> {
    /// Successful reply with a pre-rendered result.
    pub fn result(id: &'a RawValue, result: Box<RawValue>) -> Self {
        Self {
            jsonrpc: VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply with a pre-rendered error object.
    pub fn error(id: &'a RawValue, error: Box<RawValue>) -> Self {
        Self {
            jsonrpc: VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(text: &str) -> Box<RawValue> {
        RawValue::from_string(text.to_owned()).unwrap()
    }

    #[test]
    fn client_request_omits_absent_members() {
        let req = ClientRequest {
            jsonrpc: VERSION,
            method: "Svc.Sum",
            params: None,
            id: None,
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"jsonrpc":"2.0","method":"Svc.Sum"}"#
        );

        let params = json!([3, 5]);
        let req = ClientRequest {
            jsonrpc: VERSION,
            method: "Svc.Sum",
            params: Some(&params),
            id: Some(0),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"jsonrpc":"2.0","method":"Svc.Sum","params":[3,5],"id":0}"#
        );
    }

    #[test]
    fn client_response_accepts_result_and_error_forms() {
        let resp = parse_client_response(&raw(r#"{"jsonrpc":"2.0","id":7,"result":8}"#)).unwrap();
        assert_eq!(resp.id, Some(7));
        assert_eq!(resp.result.unwrap().get(), "8");
        assert!(resp.error.is_none());

        let resp = parse_client_response(&raw(
            r#"{"jsonrpc":"2.0","id":7,"error":{"code":-32000,"message":"no"}}"#,
        ))
        .unwrap();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, -32000);
    }

    #[test]
    fn client_response_null_result_is_sentinel() {
        let resp =
            parse_client_response(&raw(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)).unwrap();
        assert!(is_raw_null(&resp.result.unwrap()));
    }

    #[test]
    fn client_response_rejects_malformed() {
        for text in [
            "42",
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":1,"error":null}"#,
            r#"{"jsonrpc":"2.0","result":1,"extra":2}"#,
            r#"{"jsonrpc":"1.0","id":1,"result":1}"#,
            r#"{"jsonrpc":"2.0","id":"abc","result":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-1}}"#,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-1,"message":"m","extra":1}}"#,
            r#"{"jsonrpc":"2.0","id":1,"error":[1]}"#,
            r#"{"jsonrpc":"2.0","id":null,"result":1}"#,
        ] {
            let err = parse_client_response(&raw(text)).unwrap_err();
            assert_eq!(err.code, crate::error::INTERNAL_ERROR, "case {text}");
            assert!(err.message.starts_with("bad response: "), "case {text}");
        }
    }

    #[test]
    fn client_response_error_with_data_is_accepted() {
        let resp = parse_client_response(&raw(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-1,"message":"m","data":[1]}}"#,
        ))
        .unwrap();
        assert_eq!(resp.error.unwrap().data, Some(json!([1])));
    }

    #[test]
    fn client_response_null_id_surfaces_error() {
        let err = parse_client_response(&raw(
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.code, crate::error::PARSE_ERROR);
        assert_eq!(err.message, "Parse error");
    }

    #[test]
    fn server_request_accepts_all_valid_shapes() {
        let req =
            parse_server_request(&raw(r#"{"jsonrpc":"2.0","method":"Svc.Sum"}"#)).unwrap();
        assert!(req.id.is_none());
        assert!(req.params.is_none());

        let req = parse_server_request(&raw(
            r#"{"jsonrpc":"2.0","id":0,"method":"Svc.Sum","params":[3,5]}"#,
        ))
        .unwrap();
        assert_eq!(req.id.unwrap().get(), "0");
        assert_eq!(req.params.unwrap().get(), "[3,5]");

        let req = parse_server_request(&raw(
            r#"{"jsonrpc":"2.0","method":"Svc.Sum","params":{"a":1}}"#,
        ))
        .unwrap();
        assert!(req.id.is_none());

        let req =
            parse_server_request(&raw(r#"{"jsonrpc":"2.0","method":"Svc.Sum","id":"k-1"}"#))
                .unwrap();
        assert_eq!(req.id.unwrap().get(), "\"k-1\"");
    }

    #[test]
    fn server_request_preserves_null_id() {
        let req = parse_server_request(&raw(r#"{"jsonrpc":"2.0","method":"m","id":null}"#))
            .unwrap();
        assert!(is_raw_null(&req.id.unwrap()));
    }

    #[test]
    fn server_request_rejects_malformed() {
        for text in [
            "{}",
            "[1]",
            "\"x\"",
            r#"{"jsonrpc":"2.0"}"#,
            r#"{"method":"m","id":1}"#,
            r#"{"jsonrpc":"1.0","method":"m"}"#,
            r#"{"jsonrpc":"2.0","method":"m","extra":1}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":1,"extra":1}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":1,"params":[1],"extra":1}"#,
            r#"{"jsonrpc":"2.0","method":"m","params":3}"#,
            r#"{"jsonrpc":"2.0","method":"m","params":null}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":true}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":false}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":[1]}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":{"k":1}}"#,
            r#"{"jsonrpc":"2.0","method":7,"id":1}"#,
        ] {
            let err = parse_server_request(&raw(text)).unwrap_err();
            assert_eq!(err.code, crate::error::INVALID_REQUEST, "case {text}");
        }
    }

    #[test]
    fn server_response_shapes() {
        let id = raw("\"k\"");
        let resp = ServerResponse::result(&id, raw("8"));
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"jsonrpc":"2.0","id":"k","result":8}"#
        );

        let id = raw_null();
        let resp = ServerResponse::error(&id, raw(r#"{"code":-32600,"message":"Invalid request"}"#));
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32600,"message":"Invalid request"}}"#
        );
    }
}
