//! The per-connection HTTP session.
//!
//! One [`Session`] exists for every accepted connection. It owns the
//! connection's transport handle and parser instance (both live exactly as
//! long as the session), accumulates inbound bytes, drives the parser to its
//! milestones, invokes the application handler, and marshals the response
//! into a bounded scatter-gather buffer vector that is flushed through the
//! transport with short-write resubmission.
//!
//! # Lifecycle
//!
//! ```text
//! AwaitingRequest -> ReadingHeaders -> ReadingBody -> Dispatching
//!        ^                                                |
//!        |                                                v
//!        +--------- keep-alive ----------------- WritingResponse
//!                                                         |
//!                                                  Closing -> Closed
//! ```
//!
//! Bodyless requests skip `ReadingBody`. After a fully flushed response the
//! session either re-arms for the next request (keep-alive, parser and
//! staging fully reset) or tears the connection down.
//!
//! # Serialization
//!
//! The session is one task: every receive and every send is awaited to
//! completion before the next one is issued, so at most one of each is ever
//! outstanding and nothing else mutates the outbound queue or the staging
//! buffer concurrently. A close requested from outside (the
//! `CancellationToken`) while a send is in flight is honored only after that
//! send's completion fires.
//!
//! # Errors
//!
//! Protocol errors close this connection with a best-effort error response
//! when nothing has been written yet for the failed request; transport
//! errors are treated as a peer disconnect. Neither ever propagates beyond
//! the session's own task.

mod queue;
mod staging;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::handler::Handler;
use crate::parser::{ParseEvent, RequestParser};
use crate::protocol::{BodyLength, EngineError, ParseError, PeerAddr, RequestHead, SegmentedBody, TransportError};
use crate::transport::Transport;

use queue::SegmentQueue;
use staging::HeadStaging;

/// Observable lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Idle between requests, waiting for the first bytes of a request line.
    AwaitingRequest,
    /// A partial request head has arrived and is being accumulated.
    ReadingHeaders,
    /// The head is parsed; body bytes are streaming in.
    ReadingBody,
    /// The request is complete and the handler is running.
    Dispatching,
    /// Response segments are being flushed to the transport.
    WritingResponse,
    /// The connection is being torn down.
    Closing,
    /// The transport is closed; the session is inert.
    Closed,
}

/// One request, parsed and ready for dispatch.
struct ParsedRequest {
    request: Request<Bytes>,
    keep_alive: bool,
}

/// The per-connection state machine.
pub struct Session<T: Transport> {
    transport: T,
    peer: SocketAddr,
    parser: RequestParser,
    read_buf: BytesMut,
    staging: HeadStaging,
    queue: SegmentQueue,
    handler: Arc<dyn Handler>,
    close_signal: CancellationToken,
    state: SessionState,
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("peer", &self.peer).field("state", &self.state).finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Binds a new session to an accepted transport.
    ///
    /// `close_signal` is the external cancellation primitive: firing it is
    /// equivalent to a peer disconnect and may come from any thread (an
    /// idle-timeout reaper, server shutdown).
    pub fn new(transport: T, peer: SocketAddr, handler: Arc<dyn Handler>, close_signal: CancellationToken) -> Self {
        Self {
            transport,
            peer,
            parser: RequestParser::new(),
            read_buf: BytesMut::new(),
            staging: HeadStaging::new(),
            queue: SegmentQueue::new(),
            handler,
            close_signal,
            state: SessionState::AwaitingRequest,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Drives the connection until it closes, then releases the transport.
    ///
    /// The first receive is issued immediately; the session then follows the
    /// lifecycle above until the peer disconnects, keep-alive ends, an error
    /// forces teardown, or a close is requested.
    pub async fn run(mut self) -> Result<(), EngineError> {
        let result = self.serve().await;
        self.set_state(SessionState::Closing);
        if let Err(e) = self.transport.close().await {
            debug!(cause = %e, peer = %self.peer, "transport close reported an error");
        }
        self.set_state(SessionState::Closed);
        result
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "session state");
            self.state = state;
        }
    }

    async fn serve(&mut self) -> Result<(), EngineError> {
        loop {
            self.set_state(SessionState::AwaitingRequest);

            let parsed = match self.read_request().await {
                Ok(Some(parsed)) => parsed,
                Ok(None) => return Ok(()),
                Err(e) => {
                    // nothing has been written for this request yet, so a
                    // best-effort error status is still possible
                    warn!(cause = %e, peer = %self.peer, "request rejected");
                    let status = if e.is_oversized() {
                        StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
                    } else {
                        StatusCode::BAD_REQUEST
                    };
                    self.write_error_response(status).await;
                    return Err(e.into());
                }
            };

            let keep_alive = parsed.keep_alive;

            self.set_state(SessionState::Dispatching);
            let response = self.handler.call(parsed.request).await;

            self.set_state(SessionState::WritingResponse);
            match response {
                Ok(response) => self.write_response(response).await?,
                Err(e) => {
                    // application failure: best-effort 500, then close the
                    // connection instead of leaving it half-written
                    error!(cause = %e, peer = %self.peer, "handler failed");
                    self.write_error_response(StatusCode::INTERNAL_SERVER_ERROR).await;
                    return Ok(());
                }
            }

            // a close requested while the response was in flight is honored
            // now that its completion has fired
            if self.close_signal.is_cancelled() {
                debug!(peer = %self.peer, "deferred close honored after flush");
                return Ok(());
            }

            if !keep_alive {
                return Ok(());
            }

            // keep-alive: request N+1 strictly serializes behind this flush,
            // with no request state leaking across
            self.parser.reset();
        }
    }

    /// Reads and parses one full request.
    ///
    /// Returns `Ok(None)` when the connection ended first (peer close,
    /// transport error, or an external close request).
    async fn read_request(&mut self) -> Result<Option<ParsedRequest>, ParseError> {
        let mut head: Option<(RequestHead, BodyLength)> = None;
        let mut body = BytesMut::new();

        loop {
            // drain every milestone the buffered bytes allow before asking
            // the transport for more
            while let Some(event) = self.parser.parse(&mut self.read_buf)? {
                match event {
                    ParseEvent::Head(parsed_head, length) => {
                        trace!(method = %parsed_head.method(), target = %parsed_head.uri(), "request head parsed");
                        if !length.is_none() {
                            self.set_state(SessionState::ReadingBody);
                        }
                        head = Some((parsed_head, length));
                    }

                    ParseEvent::Body(chunk) => body.extend_from_slice(&chunk),

                    ParseEvent::End => {
                        let Some((head, _)) = head.take() else {
                            return Err(ParseError::invalid_header("request completed before its head"));
                        };
                        let keep_alive = head.should_keep_alive();
                        let mut request = head.body(body.split().freeze());
                        request.extensions_mut().insert(PeerAddr(self.peer));
                        return Ok(Some(ParsedRequest { request, keep_alive }));
                    }
                }
            }

            if head.is_none() && !self.read_buf.is_empty() {
                self.set_state(SessionState::ReadingHeaders);
            }

            let received = tokio::select! {
                biased;
                _ = self.close_signal.cancelled() => {
                    debug!(peer = %self.peer, "close requested while awaiting bytes");
                    return Ok(None);
                }
                received = self.transport.receive(&mut self.read_buf) => received,
            };

            match received {
                Ok(0) => {
                    if head.is_some() || !self.read_buf.is_empty() {
                        debug!(peer = %self.peer, "peer closed mid-request");
                    }
                    return Ok(None);
                }
                Ok(_) => {}
                Err(e) => {
                    // unsolicited close and peer reset land here too; both
                    // are equivalent to a disconnect
                    debug!(cause = %e, peer = %self.peer, "receive failed, treating as disconnect");
                    return Ok(None);
                }
            }
        }
    }

    /// Marshals one response into the outbound queue and flushes it.
    async fn write_response(&mut self, response: Response<SegmentedBody>) -> Result<(), EngineError> {
        let (parts, body) = response.into_parts();
        let segments = body.into_segments();
        let content_length: u64 = segments.iter().map(|segment| segment.len() as u64).sum();

        let head = self.staging.encode(parts, content_length)?;

        // the segment count is known here, before the send is submitted
        let segment_count = 1 + segments.iter().filter(|segment| !segment.is_empty()).count();
        self.queue.begin(segment_count);
        self.queue.push(head);
        for segment in segments {
            if !segment.is_empty() {
                self.queue.push(segment);
            }
        }

        self.flush().await
    }

    /// Drains the outbound queue through the transport.
    ///
    /// A single send is never assumed to flush everything: after a short
    /// write the cursor advances past the consumed bytes and the remaining
    /// tail is resubmitted until the queue is empty.
    async fn flush(&mut self) -> Result<(), EngineError> {
        while !self.queue.is_flushed() {
            let slices = self.queue.io_slices();
            let sent = self.transport.send_vectored(&slices).await;
            drop(slices);
            match sent {
                Ok(0) => return Err(TransportError::Closed.into()),
                Ok(consumed) => {
                    self.queue.advance(consumed);
                    trace!(bytes = consumed, remaining = self.queue.remaining(), "response bytes flushed");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.queue.clear();
        Ok(())
    }

    /// Best-effort synthesized error response; delivery failures only end
    /// the connection faster.
    async fn write_error_response(&mut self, status: StatusCode) {
        let response = Response::builder().status(status).body(SegmentedBody::new()).unwrap();
        if let Err(e) = self.write_response(response).await {
            debug!(cause = %e, peer = %self.peer, "error response could not be delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxError, make_handler};
    use crate::transport::mock::{MockHandle, MockTransport};
    use std::time::Duration;
    use tokio::sync::Notify;

    const KEEP_ALIVE_REQUEST: &[u8] = b"GET /x HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\n\r\n";
    const CLOSE_REQUEST: &[u8] = b"GET /x HTTP/1.1\r\nHost: a\r\nConnection: close\r\n\r\n";
    const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok";

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 9999))
    }

    fn ok_handler() -> Arc<dyn Handler> {
        Arc::new(make_handler(|_request: Request<Bytes>| async move {
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(http::header::CONTENT_LENGTH, 2)
                .body(SegmentedBody::from("ok"))
                .unwrap();
            Ok::<_, BoxError>(response)
        }))
    }

    fn session(transport: MockTransport) -> Session<MockTransport> {
        Session::new(transport, peer(), ok_handler(), CancellationToken::new())
    }

    #[tokio::test]
    async fn serves_one_request_then_closes() {
        let (transport, handle) = MockTransport::new([CLOSE_REQUEST]);
        session(transport).run().await.unwrap();

        assert_eq!(handle.written(), OK_RESPONSE);
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn keep_alive_serves_requests_in_order() {
        let (transport, handle) = MockTransport::new([KEEP_ALIVE_REQUEST, CLOSE_REQUEST]);
        session(transport).run().await.unwrap();

        let expected: Vec<u8> = [OK_RESPONSE, OK_RESPONSE].concat();
        assert_eq!(handle.written(), expected);
        // one receive per request; the single-outstanding assertions inside
        // the double hold throughout
        assert_eq!(handle.receive_calls(), 2);
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn keep_alive_re_arms_after_peer_silence() {
        // the peer sends one keep-alive request and then closes; the session
        // must re-arm a receive rather than tearing down after the response
        let (transport, handle) = MockTransport::new([KEEP_ALIVE_REQUEST]);
        session(transport).run().await.unwrap();

        assert_eq!(handle.written(), OK_RESPONSE);
        assert_eq!(handle.receive_calls(), 2);
    }

    #[tokio::test]
    async fn request_split_across_receives_is_reassembled() {
        let (transport, handle) = MockTransport::new([
            &b"GET /x HT"[..],
            &b"TP/1.1\r\nHost: a\r\nConn"[..],
            &b"ection: close\r\n\r\n"[..],
        ]);
        session(transport).run().await.unwrap();

        assert_eq!(handle.written(), OK_RESPONSE);
    }

    #[tokio::test]
    async fn short_writes_resubmit_without_loss_or_duplication() {
        let schedules: &[&[usize]] = &[&[1], &[3, 1, 5], &[10, 10, 10, 10], &[39, 1]];
        for limits in schedules {
            let (transport, handle) =
                MockTransport::with_write_limits([CLOSE_REQUEST], limits.iter().copied());
            session(transport).run().await.unwrap();

            assert_eq!(handle.written(), OK_RESPONSE, "schedule {limits:?} corrupted the stream");
            assert!(handle.send_calls() >= limits.len());
        }
    }

    #[tokio::test]
    async fn request_body_is_accumulated_for_dispatch() {
        let handler: Arc<dyn Handler> = Arc::new(make_handler(|request: Request<Bytes>| async move {
            assert_eq!(&request.body()[..], b"hello world");
            let response = Response::builder().status(StatusCode::OK).body(SegmentedBody::from("ok")).unwrap();
            Ok::<_, BoxError>(response)
        }));

        let (transport, handle) = MockTransport::new([
            &b"POST /submit HTTP/1.1\r\nHost: a\r\nConnection: close\r\nContent-Length: 11\r\n\r\nhello"[..],
            &b" world"[..],
        ]);
        Session::new(transport, peer(), handler, CancellationToken::new()).run().await.unwrap();

        assert_eq!(handle.written(), OK_RESPONSE);
    }

    #[tokio::test]
    async fn chunked_request_body_is_decoded() {
        let handler: Arc<dyn Handler> = Arc::new(make_handler(|request: Request<Bytes>| async move {
            assert_eq!(&request.body()[..], b"hello");
            let response = Response::builder().status(StatusCode::OK).body(SegmentedBody::from("ok")).unwrap();
            Ok::<_, BoxError>(response)
        }));

        let (transport, handle) = MockTransport::new([
            &b"POST /upload HTTP/1.1\r\nHost: a\r\nConnection: close\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n"[..],
        ]);
        Session::new(transport, peer(), handler, CancellationToken::new()).run().await.unwrap();

        assert_eq!(handle.written(), OK_RESPONSE);
    }

    #[tokio::test]
    async fn multi_segment_response_arrives_in_enqueue_order() {
        let handler: Arc<dyn Handler> = Arc::new(make_handler(|_request: Request<Bytes>| async move {
            let mut body = SegmentedBody::new();
            for segment in ["one", ", two", ", three", ", four", ", five"] {
                body.push(segment);
            }
            let response = Response::builder().status(StatusCode::OK).body(body).unwrap();
            Ok::<_, BoxError>(response)
        }));

        let (transport, handle) = MockTransport::with_write_limits([CLOSE_REQUEST], [7, 13]);
        Session::new(transport, peer(), handler, CancellationToken::new()).run().await.unwrap();

        let written = handle.written();
        let text = std::str::from_utf8(&written).unwrap();
        assert!(text.ends_with("\r\none, two, three, four, five"), "got: {text}");
        assert!(text.contains("content-length: 27\r\n"));
    }

    #[tokio::test]
    async fn malformed_request_gets_best_effort_400_then_close() {
        let (transport, handle) = MockTransport::new([&b"NOT A REQUEST\r\n\r\n"[..]]);
        let result = session(transport).run().await;

        assert!(matches!(result, Err(EngineError::Protocol { .. })));
        assert!(handle.written().starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn oversized_header_block_gets_431() {
        let mut request = b"GET / HTTP/1.1\r\nCookie: ".to_vec();
        request.extend(std::iter::repeat_n(b'a', 4 * 1024));
        request.extend_from_slice(b"\r\n\r\n");

        let (transport, handle) = MockTransport::new([request]);
        let result = session(transport).run().await;

        assert!(matches!(result, Err(EngineError::Protocol { .. })));
        assert!(handle.written().starts_with(b"HTTP/1.1 431 Request Header Fields Too Large\r\n"));
    }

    #[tokio::test]
    async fn handler_failure_gets_500_and_closes() {
        let handler: Arc<dyn Handler> = Arc::new(make_handler(|_request: Request<Bytes>| async move {
            Err::<Response<SegmentedBody>, BoxError>("boom".into())
        }));

        let (transport, handle) = MockTransport::new([KEEP_ALIVE_REQUEST]);
        Session::new(transport, peer(), handler, CancellationToken::new()).run().await.unwrap();

        assert!(handle.written().starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn close_requested_while_idle_tears_down_immediately() {
        let close_signal = CancellationToken::new();
        close_signal.cancel();

        let (transport, handle) = MockTransport::new([KEEP_ALIVE_REQUEST]);
        Session::new(transport, peer(), ok_handler(), close_signal).run().await.unwrap();

        assert!(handle.written().is_empty());
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn close_during_outstanding_send_is_deferred_until_completion() {
        let gate = Arc::new(Notify::new());
        let close_signal = CancellationToken::new();

        let (transport, handle) = MockTransport::new([KEEP_ALIVE_REQUEST]);
        let transport = transport.gated(Arc::clone(&gate));
        let session = Session::new(transport, peer(), ok_handler(), close_signal.clone());

        let task = tokio::spawn(session.run());

        // let the session progress until its send is outstanding
        while !handle.is_sending() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // request the close mid-send, then let the send complete
        close_signal.cancel();
        assert!(handle.is_sending());
        assert_eq!(handle.close_count(), 0);
        gate.notify_one();

        task.await.unwrap().unwrap();

        // the full response was flushed before the close was honored, and
        // teardown happened exactly once
        assert_eq!(handle.written(), OK_RESPONSE);
        assert_eq!(handle.close_count(), 1);
    }
}
