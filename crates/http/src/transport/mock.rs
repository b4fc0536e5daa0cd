//! Instrumented in-memory transport double for session tests.
//!
//! The double scripts what each receive delivers and how many bytes each
//! send may accept (simulating short writes), records everything that was
//! written, and asserts the single-outstanding-operation discipline: a
//! second receive or send submitted while one of the same kind is in flight
//! panics the test. Completions always cross an await point, matching the
//! never-synchronous contract of real transports.

use std::collections::VecDeque;
use std::io::IoSlice;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::sync::Notify;

use super::Transport;
use crate::protocol::TransportError;

pub(crate) struct MockTransport {
    state: Arc<Mutex<State>>,
    send_gate: Option<Arc<Notify>>,
}

/// Test-side view of the shared state, for assertions after the session
/// consumed the transport.
pub(crate) struct MockHandle {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    inbound: VecDeque<Vec<u8>>,
    write_limits: VecDeque<usize>,
    written: Vec<u8>,
    close_count: usize,
    in_receive: bool,
    in_send: bool,
    receive_calls: usize,
    send_calls: usize,
}

impl MockTransport {
    /// A transport delivering one scripted chunk per receive; once the
    /// script runs out, receives resolve with 0 (peer closed).
    pub(crate) fn new<I, B>(inbound: I) -> (Self, MockHandle)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::with_write_limits(inbound, [])
    }

    /// Like [`new`](MockTransport::new), but each send accepts at most the
    /// next scripted limit (short writes); with the limits exhausted, sends
    /// accept everything offered.
    pub(crate) fn with_write_limits<I, B, L>(inbound: I, limits: L) -> (Self, MockHandle)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
        L: IntoIterator<Item = usize>,
    {
        let state = Arc::new(Mutex::new(State {
            inbound: inbound.into_iter().map(|chunk| chunk.as_ref().to_vec()).collect(),
            write_limits: limits.into_iter().collect(),
            ..State::default()
        }));
        (Self { state: Arc::clone(&state), send_gate: None }, MockHandle { state })
    }

    /// Makes every send wait for one `notify_one` before completing, so a
    /// test can act while a send is outstanding.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.send_gate = Some(gate);
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            assert!(!state.in_receive, "second receive submitted while one is outstanding");
            state.in_receive = true;
            state.receive_calls += 1;
        }

        // completion fires asynchronously, never within the submitting call
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.in_receive = false;
        match state.inbound.pop_front() {
            Some(chunk) => {
                buf.extend_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => Ok(0),
        }
    }

    async fn send_vectored(&mut self, segments: &[IoSlice<'_>]) -> Result<usize, TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            assert!(!state.in_send, "second send submitted while one is outstanding");
            state.in_send = true;
            state.send_calls += 1;
        }

        match &self.send_gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }

        let mut state = self.state.lock().unwrap();
        state.in_send = false;

        let offered: usize = segments.iter().map(|segment| segment.len()).sum();
        let accepted = state.write_limits.pop_front().unwrap_or(offered).min(offered);

        let mut left = accepted;
        for segment in segments {
            if left == 0 {
                break;
            }
            let take = left.min(segment.len());
            state.written.extend_from_slice(&segment[..take]);
            left -= take;
        }
        Ok(accepted)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().close_count += 1;
        Ok(())
    }

    fn peer_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 9999))
    }
}

impl MockHandle {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().written.clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.lock().unwrap().close_count
    }

    pub(crate) fn receive_calls(&self) -> usize {
        self.state.lock().unwrap().receive_calls
    }

    pub(crate) fn send_calls(&self) -> usize {
        self.state.lock().unwrap().send_calls
    }

    pub(crate) fn is_sending(&self) -> bool {
        self.state.lock().unwrap().in_send
    }
}
