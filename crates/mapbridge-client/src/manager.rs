//! Process-wide handle to at most one live peer connection.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{error, info, warn};

use mapbridge_config::Endpoint;
use mapbridge_proto::{CommandEnvelope, Response};

use crate::TRANSPORT_TARGET;
use crate::connection::{ConnectError, Connection, RequestError, TransportError};

/// The manager could not produce a live connection.
///
/// This is the one error the tool-calling layer presents directly to its
/// end user as "peer not running".
#[derive(Debug, Error)]
#[error("peer is not reachable at {endpoint}; is the application running?")]
pub struct UnavailableError {
    /// Endpoint that was dialled.
    pub endpoint: String,
    /// The connect failure that exhausted the reconnect attempt.
    #[source]
    pub source: ConnectError,
}

/// Failure of a managed command exchange.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No live connection could be produced.
    #[error(transparent)]
    Unavailable(#[from] UnavailableError),
    /// The exchange failed mid-flight; the held connection was discarded.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The response bytes did not carry a valid message; the held
    /// connection was discarded because its stream position is no longer
    /// trustworthy.
    #[error(transparent)]
    Protocol(#[from] mapbridge_proto::ProtocolError),
}

impl From<RequestError> for ClientError {
    fn from(error: RequestError) -> Self {
        match error {
            RequestError::Transport(transport) => Self::Transport(transport),
            RequestError::Protocol(protocol) => Self::Protocol(protocol),
        }
    }
}

/// Lazily-connecting, self-healing owner of the process's one connection.
///
/// Every command goes through [`ConnectionManager::send`], which acquires
/// the shared handle under a lock (serialising callers, keeping the
/// protocol half-duplex), probes a held connection before reuse, and
/// replaces a stale handle with a fresh connect — exactly one reconnect
/// attempt, no background keep-alive. The per-call probe is deliberately
/// cheap; it trades a little overhead for tolerating the peer application
/// restarting independently of this process.
#[derive(Debug)]
pub struct ConnectionManager {
    endpoint: Endpoint,
    slot: Mutex<Option<Connection>>,
}

impl ConnectionManager {
    /// Creates a manager for the given endpoint; nothing is dialled yet.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            slot: Mutex::new(None),
        }
    }

    /// Sends one command envelope and returns the decoded response.
    ///
    /// Acquires (and if necessary establishes or replaces) the shared
    /// connection, performs the exchange, and on transport or protocol
    /// failure discards the handle so the next call starts from a fresh
    /// connect.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unavailable`] when no connection could be
    /// produced, otherwise the per-request failure.
    pub fn send(&self, envelope: &CommandEnvelope) -> Result<Response, ClientError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = self.acquire(&mut slot)?;
        match connection.request(envelope) {
            Ok(response) => Ok(response),
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    endpoint = %self.endpoint,
                    command = envelope.name(),
                    %error,
                    "request failed; discarding connection"
                );
                if let Some(mut dead) = slot.take() {
                    dead.close();
                }
                Err(error.into())
            }
        }
    }

    /// Returns true while a connection handle is held.
    ///
    /// The handle being present does not imply the peer is still alive;
    /// that is only established by the next acquisition or request.
    pub fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Closes and clears any held connection.
    ///
    /// Safe to call at any time; also runs on drop so every exit path of
    /// the owning process releases the handle.
    pub fn close(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut connection) = slot.take() {
            info!(target: TRANSPORT_TARGET, endpoint = %self.endpoint, "closing peer connection");
            connection.close();
        }
    }

    /// Produces a live connection in the slot.
    ///
    /// A held connection is probed first; on probe failure it is closed,
    /// discarded, and replaced by one fresh connect attempt. A connect
    /// failure surfaces immediately as [`UnavailableError`] and caches
    /// nothing.
    fn acquire<'slot>(
        &self,
        slot: &'slot mut Option<Connection>,
    ) -> Result<&'slot mut Connection, UnavailableError> {
        let stale = slot.as_mut().is_some_and(|connection| !connection.probe());
        if stale {
            if let Some(mut dead) = slot.take() {
                warn!(
                    target: TRANSPORT_TARGET,
                    endpoint = %self.endpoint,
                    "held connection is no longer valid; reconnecting"
                );
                dead.close();
            }
        }

        match slot {
            Some(connection) => Ok(connection),
            None => {
                let connection = Connection::connect(&self.endpoint).map_err(|source| {
                    error!(
                        target: TRANSPORT_TARGET,
                        endpoint = %self.endpoint,
                        %source,
                        "failed to connect to peer"
                    );
                    UnavailableError {
                        endpoint: self.endpoint.to_string(),
                        source,
                    }
                })?;
                info!(
                    target: TRANSPORT_TARGET,
                    endpoint = %self.endpoint,
                    "established peer connection"
                );
                Ok(slot.insert(connection))
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
