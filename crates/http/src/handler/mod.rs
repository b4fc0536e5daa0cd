//! The application-facing handler seam.
//!
//! A [`Handler`] receives one fully parsed request (method, target, headers,
//! accumulated body, peer address in the extensions) and produces the
//! response the session will frame and flush. Returning the response means
//! "response written"; a handler that needs to wait on its own asynchronous
//! work simply keeps its future pending; the session tolerates an
//! arbitrarily delayed response, bounded only by whatever external timeout
//! policy closes the transport.
//!
//! [`make_handler`] adapts a plain async function into a [`Handler`], which
//! covers most applications:
//!
//! ```
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use nano_http::handler::{BoxError, make_handler};
//! use nano_http::protocol::SegmentedBody;
//!
//! async fn hello(request: Request<Bytes>) -> Result<Response<SegmentedBody>, BoxError> {
//!     let response = Response::builder()
//!         .status(StatusCode::OK)
//!         .body(SegmentedBody::from("hello"))?;
//!     Ok(response)
//! }
//!
//! let handler = make_handler(hello);
//! ```

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::protocol::SegmentedBody;

/// Boxed error a handler may fail with; the session answers it with a
/// best-effort 500 and closes the connection.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// The single application callback of the server.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request<Bytes>) -> Result<Response<SegmentedBody>, BoxError>;
}

/// Adapter implementing [`Handler`] for a plain async function.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<SegmentedBody>, BoxError>> + Send,
{
    async fn call(&self, request: Request<Bytes>) -> Result<Response<SegmentedBody>, BoxError> {
        (self.f)(request).await
    }
}

/// Wraps an async function into a [`Handler`].
pub fn make_handler<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<SegmentedBody>, BoxError>> + Send,
{
    HandlerFn { f }
}
