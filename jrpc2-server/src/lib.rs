//! JSON-RPC 2.0 server for jrpc2
//!
//! This crate provides the server half of jrpc2:
//!
//! - **Codec**: translation between the byte stream and the dispatcher's
//!   request/response model, including the id translation table that lets
//!   arbitrary JSON request ids coexist with the dispatcher's `u64`
//!   sequence numbers
//! - **Dispatcher**: the method registry and the serve loops
//! - **Batch engine**: the synthetic `JSONRPC2.Batch` method that re-enters
//!   dispatch once per batch element
//! - **HTTP binding**: a hyper handler mapping one POST exchange onto one
//!   codec invocation
//!
//! # Quick start
//!
//! ```rust,no_run
//! use jrpc2_server::{from_method, Server};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::new();
//!     server.register(
//!         "Arith.Sum",
//!         from_method(|vals: [i64; 2]| async move { Ok(vals[0] + vals[1]) }),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8001").await?;
//!     server.serve_listener(listener).await
//! }
//! ```

pub mod batch;
pub mod codec;
pub mod handler;
pub mod http;
pub mod server;

pub use batch::BATCH_METHOD;
pub use codec::{RequestHeader, ServeError, ServerCodec};
pub use handler::{from_fn, from_method, Body, Handler, HandlerFuture, Reply, ServiceError};
pub use server::Server;
