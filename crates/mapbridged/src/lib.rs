//! Peer-side runtime for the MapBridge protocol.
//!
//! The peer is the long-lived GIS application process that owns the command
//! handlers. This crate provides the pieces that run inside it: a
//! [`HandlerRegistry`] populated once at startup, a [`Dispatcher`] that
//! turns decoded command envelopes into response envelopes without ever
//! letting a handler failure escape, and a [`SocketListener`] whose
//! non-blocking accept loop serves one client at a time without stalling
//! the host application's own event loop.
//!
//! Handler execution is synchronous and has no timeout or cancellation: a
//! stuck handler stalls its connection until it returns. That is a known
//! limitation accepted for simplicity — the protocol serves a single local
//! client and handlers legitimately run long (processing jobs, renders).
//!
//! The `mapbridged` binary wraps all of this around a stub registry for
//! development use; in production the same wiring is embedded in the
//! application's plugin.

mod dispatch;
mod listener;
mod registry;
pub mod telemetry;

pub use dispatch::{DispatchConnectionHandler, Dispatcher};
pub use listener::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};
pub use registry::{CommandHandler, HandlerFault, HandlerRegistry, Reply};
pub use telemetry::{TelemetryError, TelemetryHandle};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::listener");
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
