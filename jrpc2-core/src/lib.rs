//! Core JSON-RPC 2.0 types and stream plumbing for jrpc2
//!
//! This crate provides the foundations shared by the jrpc2 server and
//! client codecs:
//!
//! - **Error model**: the wire Error object, standard code constants, and
//!   the host-error-string conversions
//! - **Wire schema**: the four envelope types, their strict structural
//!   validators, and the raw `null` sentinel
//! - **Framing**: incremental extraction of self-delimited JSON values
//!   from a byte stream, with classified read failures
//!
//! # Architecture
//!
//! The crate is transport-agnostic: everything here works against
//! `tokio::io::AsyncRead`/`AsyncWrite` and raw JSON text. The `jrpc2-server`
//! and `jrpc2-client` crates build the actual codecs, the dispatcher, and
//! the HTTP binding on top of this foundation.

pub mod error;
pub mod frame;
pub mod wire;

pub use error::Error;
pub use frame::{JsonReader, ReadError};
pub use wire::{raw_null, ClientRequest, ClientResponse, ServerRequest, ServerResponse, NOTIFY_SEQ, VERSION};
