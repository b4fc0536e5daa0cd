//! The consumed asynchronous transport boundary.
//!
//! The engine never opens raw sockets directly: everything it needs from the
//! OS reactor is expressed by two traits. [`Acceptor`] owns a listening
//! endpoint and yields connected transports; [`Transport`] is one connected
//! socket with submit-and-await semantics:
//!
//! - [`Transport::receive`] requests delivery of inbound bytes and resolves
//!   exactly once, asynchronously, never within the submitting call.
//! - [`Transport::send_vectored`] submits one scatter-gather write; partial
//!   writes are possible and are *not* retried by the transport; the caller
//!   owns the resubmission loop.
//! - [`Transport::close`] is idempotent; operations in flight on a closed
//!   transport resolve with an error equivalent to a peer disconnect.
//!
//! The session relies on each call resolving before it issues the next one
//! of the same kind, so a transport never sees two concurrent receives or
//! two concurrent sends for the same connection.
//!
//! [`TcpTransport`]/[`TcpAcceptor`] implement the boundary over tokio's TCP
//! types; tests use an instrumented in-memory double.

mod tcp;

pub use tcp::{TcpAcceptor, TcpTransport};

#[cfg(test)]
pub(crate) mod mock;

use std::io::IoSlice;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::BytesMut;

use crate::protocol::TransportError;

/// One connected, async-capable socket endpoint.
#[async_trait]
pub trait Transport: Send {
    /// Delivers inbound bytes into `buf`, resolving with the number of bytes
    /// appended. Resolving with 0 means the peer closed the connection.
    async fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError>;

    /// Submits one scatter-gather write and resolves with the number of
    /// bytes the transport accepted, which may be fewer than offered.
    async fn send_vectored(&mut self, segments: &[IoSlice<'_>]) -> Result<usize, TransportError>;

    /// Closes the endpoint. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Address of the connected peer.
    fn peer_addr(&self) -> SocketAddr;
}

/// A listening endpoint producing connected transports.
#[async_trait]
pub trait Acceptor: Send {
    type Transport: Transport + 'static;

    /// Waits for and returns the next accepted connection with its peer
    /// address.
    async fn accept(&mut self) -> Result<(Self::Transport, SocketAddr), TransportError>;

    /// The locally bound address.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}
