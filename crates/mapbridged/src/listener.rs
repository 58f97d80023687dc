//! Socket listener and accept loop for the peer.
//!
//! The listener binds a TCP endpoint, switches it to non-blocking mode, and
//! polls `accept` with a bounded backoff on a background thread. Each
//! accepted connection is driven to completion by its handler before the
//! next accept — the protocol serves a single client at a time by design,
//! and concurrent clients simply queue in the OS backlog (multi-client use
//! is unsupported and undefined).
//!
//! The bounded poll interval is what lets the accept loop coexist with a
//! host application's own event loop: nothing here blocks for longer than
//! the backoff.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use mapbridge_config::Endpoint;

use crate::LISTENER_TARGET;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Handles accepted client connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Drives a single connection to completion.
    ///
    /// Runs on the listener thread; while it runs, no further connections
    /// are accepted. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Errors surfaced while binding or running the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The endpoint's host name did not resolve.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying resolver failure.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no usable address.
    #[error("{host}:{port} resolved to no addresses")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the TCP listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying socket failure.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to configure non-blocking accept: {source}")]
    NonBlocking {
        /// Underlying socket failure.
        #[source]
        source: io::Error,
    },
    /// The accept-loop thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Listener bound to the bridge endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: Endpoint,
    listener: TcpListener,
}

impl SocketListener {
    /// Binds the endpoint without starting the accept loop.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when resolution or the bind fails.
    pub fn bind(endpoint: &Endpoint) -> Result<Self, ListenerError> {
        let (host, port) = endpoint.addr();
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| ListenerError::Resolve {
                host: host.to_owned(),
                port,
                source,
            })?;
        let addr = addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| ListenerError::ResolveEmpty {
                host: host.to_owned(),
                port,
            })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Returns the bound local address, useful with an ephemeral port.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Starts the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the listener cannot be
    /// switched to non-blocking mode.
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, handler.as_ref()));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Requests the accept loop to stop.
    ///
    /// The loop observes the flag between connections; a connection being
    /// served finishes first.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the loop thread
    /// panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: &dyn ConnectionHandler,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                // One client at a time: the connection runs to completion
                // here before the next accept is attempted.
                handler.handle(stream);
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(target: LISTENER_TARGET, %error, "socket accept error");
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, endpoint = %listener.endpoint, "listener stopped");
}

fn accept_connection(listener: &TcpListener) -> Result<Option<TcpStream>, io::Error> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}
