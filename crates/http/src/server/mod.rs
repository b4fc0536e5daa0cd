//! The HTTP server: listener ownership, session factory, shutdown.
//!
//! [`Server`] owns the transport's listening endpoint and the single
//! application [`Handler`]. Every accepted connection becomes a
//! [`Session`](crate::session::Session) bound to that handler and to its
//! peer address, registered for shutdown bookkeeping, spawned as its own
//! task, and immediately armed with its first receive.
//!
//! The session registry maps session ids to close signals and is used only
//! for bookkeeping and shutdown, never for routing. [`ServerHandle::shutdown`]
//! stops accepting and lets live sessions drain naturally;
//! [`ServerHandle::force_shutdown`] additionally fires every registered
//! close signal, which each session honors at its next safe point (after an
//! outstanding send completes).
//!
//! [`Server::run`] is the blocking entry point: it builds a multi-thread
//! runtime sized by the builder's worker settings and applies worker
//! priority through `nano-thread` as each worker starts.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use nano_thread::Priority;

use crate::handler::Handler;
use crate::protocol::EngineError;
use crate::session::Session;
use crate::transport::{Acceptor, TcpAcceptor};

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,

    #[error("handler must be set")]
    MissingHandler,

    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },
}

/// Configures a [`Server`].
pub struct ServerBuilder {
    addresses: Option<io::Result<Vec<SocketAddr>>>,
    handler: Option<Arc<dyn Handler>>,
    worker_threads: Option<usize>,
    worker_priority: Option<Priority>,
    worker_stack_size: Option<usize>,
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("addresses", &self.addresses)
            .field("worker_threads", &self.worker_threads)
            .field("worker_priority", &self.worker_priority)
            .field("worker_stack_size", &self.worker_stack_size)
            .finish_non_exhaustive()
    }
}

impl ServerBuilder {
    fn new() -> Self {
        Self { addresses: None, handler: None, worker_threads: None, worker_priority: None, worker_stack_size: None }
    }

    /// The address(es) to listen on.
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.addresses = Some(address.to_socket_addrs().map(|addrs| addrs.collect()));
        self
    }

    /// The single application handler every session dispatches to.
    pub fn handler<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Number of runtime worker threads used by [`Server::run`].
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Scheduling priority applied to each worker thread as it starts.
    pub fn worker_priority(mut self, priority: Priority) -> Self {
        self.worker_priority = Some(priority);
        self
    }

    /// Stack size for each worker thread; unset means the OS default.
    pub fn worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = Some(bytes);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let addresses = match self.addresses {
            None => return Err(ServerBuildError::MissingAddress),
            Some(Err(source)) => return Err(ServerBuildError::InvalidAddress { source }),
            Some(Ok(addresses)) if addresses.is_empty() => return Err(ServerBuildError::MissingAddress),
            Some(Ok(addresses)) => addresses,
        };
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        Ok(Server {
            addresses,
            handler,
            worker_threads: self.worker_threads,
            worker_priority: self.worker_priority,
            worker_stack_size: self.worker_stack_size,
        })
    }
}

/// The HTTP server.
///
/// Created once at startup, torn down once at shutdown; sessions come and go
/// continuously in between.
pub struct Server {
    addresses: Vec<SocketAddr>,
    handler: Arc<dyn Handler>,
    worker_threads: Option<usize>,
    worker_priority: Option<Priority>,
    worker_stack_size: Option<usize>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("addresses", &self.addresses).finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Binds the listener and starts accepting.
    ///
    /// Runs inside an existing runtime and returns once the listener is
    /// live; the accept loop continues in the background until the returned
    /// handle shuts it down.
    pub async fn start(self) -> Result<ServerHandle, EngineError> {
        let acceptor = TcpAcceptor::bind(&self.addresses[..]).await?;
        let local_addr = acceptor.local_addr()?;
        info!(address = %local_addr, "server listening");

        let registry = Arc::new(SessionRegistry::default());
        let accept_signal = CancellationToken::new();
        let accept_task =
            tokio::spawn(accept_loop(acceptor, self.handler, Arc::clone(&registry), accept_signal.clone()));

        Ok(ServerHandle { local_addr, registry, accept_signal, accept_task })
    }

    /// Blocking entry point: builds the worker runtime and serves until the
    /// accept loop stops.
    ///
    /// Worker count, stack size and priority come from the builder; the
    /// priority is applied through `nano-thread` as each worker starts. A
    /// worker that cannot take the requested priority still runs; the
    /// server is only fatal when the runtime itself cannot start.
    pub fn run(self) -> Result<(), EngineError> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("nano-http-worker");
        if let Some(count) = self.worker_threads {
            builder.worker_threads(count);
        }
        if let Some(bytes) = self.worker_stack_size {
            builder.thread_stack_size(bytes);
        }
        if let Some(priority) = self.worker_priority {
            builder.on_thread_start(move || {
                if let Err(e) = nano_thread::set_current_priority(priority) {
                    warn!(cause = %e, "worker priority not applied");
                }
            });
        }

        let runtime = builder.build().map_err(|source| EngineError::Startup { source })?;
        runtime.block_on(async move {
            let handle = self.start().await?;
            handle.wait().await
        })
    }
}

async fn accept_loop<A>(
    mut acceptor: A,
    handler: Arc<dyn Handler>,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
) where
    A: Acceptor + 'static,
{
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = acceptor.accept() => accepted,
        };

        let (transport, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                // resource exhaustion or a transient accept failure must not
                // stop the accept loop
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let (session_id, close_signal) = registry.register();
        let session = Session::new(transport, peer, Arc::clone(&handler), close_signal);
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            match session.run().await {
                Ok(()) => info!(peer = %peer, "connection finished"),
                Err(e) => error!(cause = %e, peer = %peer, "connection failed"),
            }
            registry.deregister(session_id);
        });
    }
}

/// Live-session bookkeeping: session id to close signal.
///
/// Mutated from accept and close paths concurrently, hence the mutex; used
/// only for shutdown, never for routing.
#[derive(Debug, Default)]
struct SessionRegistry {
    sessions: Mutex<HashMap<u64, CancellationToken>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    fn register(&self) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let signal = CancellationToken::new();
        self.sessions.lock().unwrap().insert(id, signal.clone());
        (id, signal)
    }

    fn deregister(&self, id: u64) {
        self.sessions.lock().unwrap().remove(&id);
    }

    fn close_all(&self) {
        for signal in self.sessions.lock().unwrap().values() {
            signal.cancel();
        }
    }

    fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

/// Handle to a started server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    accept_signal: CancellationToken,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    /// The actually bound address (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently tracked sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Stops accepting new connections; live sessions drain naturally.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        self.accept_signal.cancel();
        join_accept_task(self.accept_task).await
    }

    /// Stops accepting and closes every tracked session immediately.
    pub async fn force_shutdown(self) -> Result<(), EngineError> {
        self.accept_signal.cancel();
        self.registry.close_all();
        join_accept_task(self.accept_task).await
    }

    /// Runs until the accept loop stops.
    pub async fn wait(self) -> Result<(), EngineError> {
        join_accept_task(self.accept_task).await
    }
}

async fn join_accept_task(task: JoinHandle<()>) -> Result<(), EngineError> {
    task.await.map_err(|e| EngineError::Startup { source: io::Error::other(e) })
}
