//! Client-side transport for the MapBridge protocol.
//!
//! The tool-calling process talks to the long-lived GIS application through
//! a single TCP connection. [`Connection`] owns one socket and performs the
//! strictly half-duplex send-then-read-until-decodable exchange;
//! [`ConnectionManager`] holds at most one live connection for the process,
//! establishing it lazily, probing it before reuse, and replacing it (never
//! repairing it in place) when it goes stale.
//!
//! Callers must serialise requests; one request is in flight at a time and
//! pipelining is undefined behaviour. The manager's internal lock enforces
//! this for everyone who goes through it.

mod connection;
mod manager;

pub use connection::{ConnectError, Connection, RequestError, TransportError};
pub use manager::{ClientError, ConnectionManager, UnavailableError};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
