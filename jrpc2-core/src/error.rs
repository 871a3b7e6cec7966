//! Error model for jrpc2
//!
//! This module implements the JSON-RPC 2.0 "Error object" as defined by the
//! specification (https://www.jsonrpc.org/specification#error_object), the
//! standard error code constants, and the conversions between host-framework
//! error strings and structured errors.
//!
//! # Two representations
//!
//! Errors cross two boundaries in this library:
//!
//! - **The wire**: the `error` member of a response is a JSON object with
//!   `code`, `message`, and optional `data`. That is the [`Error`] type.
//! - **The host framework**: the dispatcher and the RPC client carry errors
//!   as plain strings (a handler failure, a "method not found" report).
//!   [`Error::from_message`] maps those strings back onto standard codes,
//!   and [`Error::from_error_string`] recovers a structured error from a
//!   string that contains one.
//!
//! # Stringification
//!
//! `Display` for [`Error`] renders the canonical JSON of the object itself.
//! This is load-bearing: the server codec recognizes handler errors that are
//! already JSON objects and passes them through verbatim, so a structured
//! error survives a round trip through the host framework's string channel.
//! Stringification must never fail; if serialization does, the output falls
//! back to a hand-built minimal object carrying [`MARSHAL_FAILURE`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Invalid JSON was received (-32700).
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid Request object (-32600).
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist or is not available (-32601).
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameter(s) (-32602).
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error (-32603).
pub const INTERNAL_ERROR: i64 = -32603;
/// Implementation-defined server error (-32000).
pub const SERVER_ERROR: i64 = -32000;
/// Error stringification itself failed (-32001).
pub const MARSHAL_FAILURE: i64 = -32001;

const MARSHAL_FAILURE_MESSAGE: &str = "error serialization failed";

/// Host-framework error strings that mean the requested method cannot be
/// dispatched. Anything with one of these prefixes maps to
/// [`METHOD_NOT_FOUND`]; every other message maps to [`SERVER_ERROR`].
const METHOD_NOT_FOUND_PREFIXES: [&str; 3] = [
    "rpc: service/method request ill-formed",
    "rpc: can't find service",
    "rpc: can't find method",
];

/// JSON-RPC 2.0 Error object
///
/// Appears verbatim as the `error` member of a response. The reserved code
/// range -32768..=-32000 belongs to the protocol; applications are free to
/// use codes outside it.
///
/// # Examples
///
/// ```rust
/// use jrpc2_core::error::{Error, METHOD_NOT_FOUND};
///
/// let err = Error::new(METHOD_NOT_FOUND, "Method not found");
/// assert_eq!(err.to_string(), r#"{"code":-32601,"message":"Method not found"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    /// Numeric error code.
    pub code: i64,
    /// Short, human-readable description.
    pub message: String,
    /// Optional structured context, omitted from the wire when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Error {
    /// Create an error with the given code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error carrying additional `data`.
    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// `-32700 Parse error`, written with a null id when the incoming bytes
    /// are not JSON at all.
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    /// `-32600 Invalid request`, written with a null id when the envelope
    /// fails structural validation.
    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid request")
    }

    /// `-32602 Invalid params` with a specific reason.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// `-32603 Internal error` with a specific reason.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Build an error from a host-framework error string, auto-detecting the
    /// code.
    ///
    /// Dispatch failures are reported by the host framework as strings with
    /// well-known prefixes ("rpc: can't find method ..." and friends); those
    /// become [`METHOD_NOT_FOUND`]. Everything else is an application
    /// failure and becomes [`SERVER_ERROR`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = if METHOD_NOT_FOUND_PREFIXES
            .iter()
            .any(|prefix| message.starts_with(prefix))
        {
            METHOD_NOT_FOUND
        } else {
            SERVER_ERROR
        };
        Self::new(code, message)
    }

    /// Recover a structured error from an error string that contains one.
    ///
    /// The RPC client reports a failed body decode as `"reading body
    /// <error-json>"`; a remote failure arrives as the error object's
    /// canonical JSON. Both shapes parse here: a `"reading ..."` prefix is
    /// stripped up to the first `{` when the string ends with `}`, then the
    /// remainder is parsed as an [`Error`].
    pub fn from_error_string(raw: &str) -> Result<Self, serde_json::Error> {
        let mut text = raw;
        if text.starts_with("reading ") && text.ends_with('}') {
            if let Some(start) = text.find('{') {
                text = &text[start..];
            }
        }
        serde_json::from_str(text)
    }
}

impl fmt::Display for Error {
    /// Render the canonical JSON of the error object.
    ///
    /// Must not fail: a serialization failure degrades to a minimal
    /// hand-built object with code [`MARSHAL_FAILURE`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(err) => {
                let message = serde_json::to_string(&err.to_string())
                    .unwrap_or_else(|_| format!("\"{MARSHAL_FAILURE_MESSAGE}\""));
                write!(f, r#"{{"code":{MARSHAL_FAILURE},"message":{message}}}"#)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_codes() {
        assert_eq!(Error::parse_error().code, -32700);
        assert_eq!(Error::invalid_request().code, -32600);
        assert_eq!(Error::invalid_params("x").code, -32602);
        assert_eq!(Error::internal("x").code, -32603);
    }

    #[test]
    fn display_is_canonical_json() {
        let err = Error::new(SERVER_ERROR, "boom");
        assert_eq!(err.to_string(), r#"{"code":-32000,"message":"boom"}"#);

        let err = Error::with_data(INVALID_PARAMS, "bad", json!({"want": "array"}));
        assert_eq!(
            err.to_string(),
            r#"{"code":-32602,"message":"bad","data":{"want":"array"}}"#
        );
    }

    #[test]
    fn display_round_trips_canonical_forms() {
        for text in [
            r#"{"code":-32700,"message":"Parse error"}"#,
            r#"{"code":-32000,"message":"ouch","data":[1,2]}"#,
        ] {
            let parsed: Error = serde_json::from_str(text).unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn from_message_detects_dispatch_failures() {
        for msg in [
            "rpc: service/method request ill-formed: nodot",
            "rpc: can't find service Missing.Sum",
            "rpc: can't find method Svc.Missing",
        ] {
            assert_eq!(Error::from_message(msg).code, METHOD_NOT_FOUND);
        }
        assert_eq!(Error::from_message("db timeout").code, SERVER_ERROR);
    }

    #[test]
    fn from_error_string_plain_object() {
        let err = Error::from_error_string(r#"{"code":-32601,"message":"nope"}"#).unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn from_error_string_strips_reading_prefix() {
        let err =
            Error::from_error_string(r#"reading body {"code":-32603,"message":"bad"}"#).unwrap();
        assert_eq!(err.code, -32603);
        assert_eq!(err.message, "bad");
    }

    #[test]
    fn from_error_string_rejects_non_json() {
        assert!(Error::from_error_string("connection is shut down").is_err());
    }

    #[test]
    fn data_is_omitted_when_absent() {
        let json = serde_json::to_string(&Error::parse_error()).unwrap();
        assert!(!json.contains("data"));
    }
}
