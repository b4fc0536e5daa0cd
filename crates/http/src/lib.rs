//! An embeddable asynchronous HTTP server engine
//!
//! This crate is the session layer of a small HTTP/1.1 server: it sits on a
//! pluggable asynchronous transport, turns raw byte streams into parsed
//! requests, and turns application responses into correctly framed,
//! non-blocking, scatter-gather socket writes. It manages partial reads,
//! partial writes, header/body framing, buffer lifetime and keep-alive reuse
//! without ever blocking a worker thread.
//!
//! # Features
//!
//! - HTTP/1.1 request parsing with content-length and chunked bodies
//! - Scatter-gather response writes with short-write resubmission
//! - Keep-alive connections with full per-request parser reset
//! - Pluggable transport boundary (TCP provided, test doubles trivial)
//! - Graceful and hard server shutdown over a session registry
//! - Worker-thread sizing and priority through `nano-thread`
//! - Clean error handling: protocol and transport failures close one
//!   connection, never the server
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use nano_http::handler::{BoxError, make_handler};
//! use nano_http::protocol::SegmentedBody;
//! use nano_http::server::Server;
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     let server = Server::builder()
//!         .address("127.0.0.1:8080")
//!         .handler(make_handler(hello_world))
//!         .build()
//!         .expect("server configuration incomplete");
//!
//!     let handle = server.start().await.expect("bind failed");
//!     handle.wait().await.expect("server stopped abnormally");
//! }
//!
//! async fn hello_world(request: Request<Bytes>) -> Result<Response<SegmentedBody>, BoxError> {
//!     tracing::info!(path = request.uri().path(), "incoming request");
//!
//!     let response = Response::builder()
//!         .status(StatusCode::OK)
//!         .body(SegmentedBody::from("Hello World!\r\n"))
//!         .unwrap();
//!
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`transport`]: The consumed async-I/O boundary (bind/accept, receive,
//!   scatter-gather send, close) and its TCP implementation
//! - [`parser`]: Incremental request parsing driven by the session
//! - [`session`]: The per-connection state machine and buffer management
//! - [`server`]: Listener ownership, session factory, registry and shutdown
//! - [`handler`]: The application-facing request handler seam
//! - [`protocol`]: Shared request/response vocabulary and error types
//!
//! # Concurrency model
//!
//! Each accepted connection becomes one session task on a multi-thread
//! runtime. A session never has more than one receive and one send in
//! flight: every transport operation is awaited to completion before the
//! next is issued, which is the invariant that keeps the outbound buffer
//! vector and the header staging buffer free of data races. The only
//! blocking call in the whole engine is a worker-thread join during orderly
//! shutdown; nothing on the I/O path blocks.
//!
//! # Limitations
//!
//! - HTTP/1.1 (and 1.0) only
//! - No TLS (terminate upstream)
//! - Maximum request header block: 2KB, at most 32 header fields

pub mod handler;
pub mod parser;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
