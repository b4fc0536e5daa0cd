//! TCP implementation of the transport boundary over tokio.

use std::io::IoSlice;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

use super::{Acceptor, Transport};
use crate::protocol::TransportError;

/// Capacity reserved ahead of each receive so the read lands in one piece
/// for typical requests.
const RECEIVE_CHUNK_BYTES: usize = 4 * 1024;

/// Listening TCP endpoint.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds and listens on `address`.
    ///
    /// Fails with [`TransportError::AddressInUse`] or
    /// [`TransportError::PermissionDenied`] when the OS refuses the binding.
    pub async fn bind<A: ToSocketAddrs>(address: A) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address).await.map_err(TransportError::from_io)?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    type Transport = TcpTransport;

    async fn accept(&mut self) -> Result<(TcpTransport, SocketAddr), TransportError> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::from_io)?;
        Ok((TcpTransport { stream: Some(stream), peer }, peer))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::from_io)
    }
}

/// One connected TCP socket.
///
/// Closing takes the stream out, so later submissions fail with
/// [`TransportError::Closed`] instead of touching a dead socket.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        buf.reserve(RECEIVE_CHUNK_BYTES);
        let received = stream.read_buf(buf).await.map_err(TransportError::from_io)?;
        trace!(bytes = received, "received");
        Ok(received)
    }

    async fn send_vectored(&mut self, segments: &[IoSlice<'_>]) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let sent = stream.write_vectored(segments).await.map_err(TransportError::from_io)?;
        trace!(bytes = sent, "sent");
        Ok(sent)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            // best-effort: a peer that already vanished is not an error here
            if let Err(e) = stream.shutdown().await {
                debug!(cause = %e, "shutdown on close reported an error");
            }
        }
        Ok(())
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
