//! jrpc2 - JSON-RPC 2.0 codec library with stream and HTTP transports
//!
//! This is the convenience crate re-exporting the jrpc2 workspace members.
//! Depend on it when you want the client and the server behind a single
//! dependency; depend on the individual crates when you only need one side.
//!
//! # Architecture
//!
//! - **jrpc2-core**: wire types, envelope validators, error model, JSON
//!   value framing
//! - **jrpc2-server**: server codec, dispatcher, batch engine, HTTP
//!   binding
//! - **jrpc2-client**: client codec, RPC client, HTTP connection
//!
//! # Quick start
//!
//! ```rust,no_run
//! use jrpc2::server::{from_method, Server};
//! use jrpc2::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new();
//!     server.register(
//!         "Arith.Sum",
//!         from_method(|vals: [i64; 2]| async move { Ok(vals[0] + vals[1]) }),
//!     );
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8001").await?;
//!     tokio::spawn(async move { server.serve_listener(listener).await });
//!
//!     let client = Client::dial("127.0.0.1:8001").await?;
//!     let sum: i64 = client.call("Arith.Sum", [3, 5]).await?;
//!     assert_eq!(sum, 8);
//!     Ok(())
//! }
//! ```

pub use jrpc2_client as client;
pub use jrpc2_core as core;
pub use jrpc2_server as server;

pub use jrpc2_client::{Client, ClientError};
pub use jrpc2_core::Error;
pub use jrpc2_server::Server;
