//! Handler traits and adapters for service methods
//!
//! A [`Handler`] is one registered service method. Handlers receive the raw
//! request params plus a handle to the owning [`Server`] (the batch method
//! re-enters dispatch through it) and produce either a result value or an
//! error that the codec renders into the response's `error` member.
//!
//! # Creating handlers
//!
//! - [`from_fn`]: wrap an async closure working with raw JSON params
//! - [`from_method`]: wrap an async closure with typed params and result;
//!   deserialization failures automatically become `-32602 Invalid params`
//!
//! # Error channel
//!
//! The host framework carries handler failures as strings. A
//! [`ServiceError::Rpc`] renders to the error object's canonical JSON, which
//! the codec recognizes and passes through verbatim; a
//! [`ServiceError::Message`] gets a standard code auto-detected when the
//! response is framed.

use crate::server::Server;
use jrpc2_core::error::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Request body handed to a handler by the dispatcher.
#[derive(Debug)]
pub enum Body {
    /// The request carried no `params` member.
    None,
    /// Raw params exactly as sent, always an array or object.
    Params(Box<RawValue>),
    /// Parsed batch elements. Only the registered batch method ever sees
    /// this variant.
    Batch(Vec<Box<RawValue>>),
}

/// Reply payload handed from a handler back to the codec.
#[derive(Debug)]
pub enum Reply {
    /// An ordinary result value.
    Value(Value),
    /// Pre-encoded responses emitted verbatim as a JSON array, or not at
    /// all when empty. Produced by the batch method.
    Raw(Vec<Box<RawValue>>),
}

/// A service method failure.
#[derive(Debug, ThisError)]
pub enum ServiceError {
    /// A structured error. Its string form is the canonical JSON of the
    /// error object, which survives the host framework's string channel
    /// intact.
    #[error(transparent)]
    Rpc(#[from] Error),
    /// A plain message; the codec auto-detects a standard code for it.
    #[error("{0}")]
    Message(String),
}

impl From<String> for ServiceError {
    fn from(message: String) -> Self {
        ServiceError::Message(message)
    }
}

impl From<&str> for ServiceError {
    fn from(message: &str) -> Self {
        ServiceError::Message(message.to_owned())
    }
}

/// Boxed future returned by [`Handler::call`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, ServiceError>> + Send>>;

/// One registered service method.
///
/// Handlers must be `Send + Sync`: the dispatcher shares them across
/// connection tasks without cloning the underlying logic.
pub trait Handler: Send + Sync {
    /// Handle one request body, producing the reply payload.
    fn call(&self, server: Server, body: Body) -> HandlerFuture;
}

struct FnHandler<F> {
    func: F,
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Option<Box<RawValue>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
{
    fn call(&self, _server: Server, body: Body) -> HandlerFuture {
        let params = match body {
            Body::None => None,
            Body::Params(params) => Some(params),
            // A plain handler registered under the batch method name cannot
            // interpret pre-parsed batch elements.
            Body::Batch(_) => {
                return Box::pin(async { Err(ServiceError::Rpc(Error::invalid_request())) })
            }
        };
        let fut = (self.func)(params);
        Box::pin(async move { fut.await.map(Reply::Value) })
    }
}

/// Create a handler from an async function working with raw JSON params.
///
/// # Examples
///
/// ```rust
/// use jrpc2_server::from_fn;
///
/// let handler = from_fn(|params| async move {
///     Ok(serde_json::json!({ "echo": params.map(|p| p.get().to_owned()) }))
/// });
/// ```
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Option<Box<RawValue>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
{
    Box::new(FnHandler { func })
}

/// Create a handler from an async function with typed params and result.
///
/// Params deserialize into `P` before the function runs; a mismatch fails
/// the call with `-32602 Invalid params`. An absent `params` member
/// deserializes from JSON null, which works for `Option<T>` and unit
/// parameter types.
///
/// # Examples
///
/// ```rust
/// use jrpc2_server::from_method;
///
/// let sum = from_method(|vals: [i64; 2]| async move { Ok(vals[0] + vals[1]) });
/// ```
pub fn from_method<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ServiceError>> + Send + 'static,
{
    let func = Arc::new(func);
    from_fn(move |params: Option<Box<RawValue>>| {
        let func = Arc::clone(&func);
        async move {
            let text = params.as_deref().map(RawValue::get).unwrap_or("null");
            let params: P = serde_json::from_str(text)
                .map_err(|err| Error::invalid_params(err.to_string()))?;
            let reply = func(params).await?;
            let value =
                serde_json::to_value(reply).map_err(|err| Error::internal(err.to_string()))?;
            Ok(value)
        }
    })
}
