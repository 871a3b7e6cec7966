//! JSON-RPC 2.0 client for jrpc2
//!
//! This crate provides the client half of jrpc2:
//!
//! - **Codec**: request framing (with parameter normalization and the
//!   notification sentinel) and strict response validation, plus the
//!   pending method table that maps response ids back to method names
//! - **Client**: concurrent calls multiplexed over one connection, with
//!   pending-call bookkeeping and clean shutdown classification
//! - **HTTP connection**: the byte-stream contract implemented over a
//!   queue of in-flight HTTP POST exchanges
//!
//! # Quick start
//!
//! ```rust,no_run
//! use jrpc2_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect_http("http://127.0.0.1:8001/rpc");
//!     let sum: i64 = client.call("Arith.Sum", [3, 5]).await?;
//!     println!("{sum}");
//!     client.notify("Arith.Sum", [1, 2]).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod http;

pub use client::{server_error, Client, ClientError};
pub use codec::{decode_reply, ClientCodec, ClientReadHalf, ClientWriteHalf, ResponseHeader};
pub use http::HttpConn;
