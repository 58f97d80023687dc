//! A single request/response connection to the peer.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use mapbridge_config::Endpoint;
use mapbridge_proto::codec::{self, DecodeOutcome, FrameDecoder};
use mapbridge_proto::{CommandEnvelope, ProtocolError, Response};

use crate::TRANSPORT_TARGET;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 4096;

/// Failure to open a TCP stream to the peer.
///
/// Connect errors are never retried here; the retry policy belongs to the
/// [`crate::ConnectionManager`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The endpoint's host name did not resolve.
    #[error("failed to resolve peer address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being connected to.
        endpoint: String,
        /// Underlying resolver failure.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no usable address.
    #[error("peer address {endpoint} resolved to nothing")]
    NoAddress {
        /// Endpoint being connected to.
        endpoint: String,
    },
    /// The TCP connect itself failed.
    #[error("failed to connect to peer at {endpoint}: {source}")]
    Connect {
        /// Endpoint being connected to.
        endpoint: String,
        /// Underlying socket failure.
        #[source]
        source: io::Error,
    },
}

/// Mid-exchange I/O failure.
///
/// Any transport error invalidates the connection it occurred on; the
/// manager discards the handle and reconnects on the next acquisition.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Writing the request to the socket failed.
    #[error("failed to send request: {0}")]
    Send(#[source] io::Error),
    /// Reading the response from the socket failed.
    #[error("failed to read response: {0}")]
    Receive(#[source] io::Error),
    /// The peer closed the stream before a complete response decoded.
    #[error("peer closed the connection before a complete response arrived")]
    ClosedMidResponse,
}

/// Failure of a single request/response exchange.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The transport failed mid-exchange.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The bytes exchanged did not carry a valid message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One open socket to the peer, used for half-duplex request/response.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Opens a TCP stream to the peer with a bounded connect timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] when resolution or the connect fails. No
    /// retry is attempted inside this call.
    pub fn connect(endpoint: &Endpoint) -> Result<Self, ConnectError> {
        let endpoint_display = endpoint.to_string();
        let address = resolve_address(endpoint).map_err(|source| ConnectError::Resolve {
            endpoint: endpoint_display.clone(),
            source,
        })?;
        let address = address.ok_or_else(|| ConnectError::NoAddress {
            endpoint: endpoint_display.clone(),
        })?;

        let stream = TcpStream::connect_timeout(&address, CONNECT_TIMEOUT).map_err(|source| {
            ConnectError::Connect {
                endpoint: endpoint_display.clone(),
                source,
            }
        })?;
        debug!(target: TRANSPORT_TARGET, endpoint = %endpoint_display, "connected to peer");
        Ok(Self { stream })
    }

    /// Sends one command envelope and reads one response.
    ///
    /// The request is written in full before any read; the response is
    /// assembled by feeding each received chunk to the frame decoder until
    /// a complete document parses. A zero-length read before completion
    /// means the peer closed the connection mid-response.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Transport`] for I/O faults and premature
    /// stream end, [`RequestError::Protocol`] when the response bytes can
    /// never parse.
    pub fn request(&mut self, envelope: &CommandEnvelope) -> Result<Response, RequestError> {
        let payload = codec::encode(envelope)?;
        self.stream
            .write_all(&payload)
            .and_then(|()| self.stream.flush())
            .map_err(TransportError::Send)?;

        let mut decoder = FrameDecoder::new();
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            let bytes_read =
                read_with_retry(&mut self.stream, &mut chunk).map_err(TransportError::Receive)?;
            if bytes_read == 0 {
                return Err(TransportError::ClosedMidResponse.into());
            }
            match decoder.feed(&chunk[..bytes_read]) {
                DecodeOutcome::Complete(value) => return Ok(Response::from_value(value)),
                DecodeOutcome::NeedMore => {}
                DecodeOutcome::Failed(error) => return Err(error.into()),
            }
        }
    }

    /// Best-effort liveness check on the underlying socket.
    ///
    /// Drains any pending socket error, then attempts a zero-byte send. A
    /// send may succeed locally even though the remote peer is gone, so a
    /// `true` here is not a guarantee — the authoritative liveness signal
    /// is the next real request failing.
    pub fn probe(&mut self) -> bool {
        match self.stream.take_error() {
            Ok(None) => {}
            Ok(Some(_)) | Err(_) => return false,
        }
        self.stream.write(&[]).is_ok()
    }

    /// Releases the socket.
    ///
    /// Idempotent: shutting down an already-closed stream is a no-op.
    pub fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve_address(endpoint: &Endpoint) -> io::Result<Option<SocketAddr>> {
    let mut addrs = endpoint.addr().to_socket_addrs()?;
    Ok(addrs.find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_))))
}

fn read_with_retry(stream: &mut TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    use serde_json::json;

    use mapbridge_proto::codec::{DecodeOutcome, FrameDecoder};

    use super::*;

    /// Spawns a one-shot peer thread and returns the endpoint to dial.
    fn spawn_peer<F>(serve: F) -> Endpoint
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream);
            }
        });
        Endpoint::new("127.0.0.1", addr.port())
    }

    /// Reads one parse-framed message from the stream.
    fn read_message(stream: &mut TcpStream) -> serde_json::Value {
        let mut decoder = FrameDecoder::new();
        let mut chunk = [0_u8; 256];
        loop {
            let read = stream.read(&mut chunk).expect("read");
            assert_ne!(read, 0, "client closed before sending a full message");
            if let DecodeOutcome::Complete(value) = decoder.feed(&chunk[..read]) {
                return value;
            }
        }
    }

    #[test]
    fn request_exchanges_one_envelope_for_one_response() {
        let endpoint = spawn_peer(|mut stream| {
            let request = read_message(&mut stream);
            assert_eq!(request["type"], "ping");
            stream
                .write_all(br#"{"pong": true}"#)
                .expect("write response");
        });

        let mut connection = Connection::connect(&endpoint).expect("connect");
        let response = connection
            .request(&CommandEnvelope::new("ping"))
            .expect("request");
        assert_eq!(response, Response::Bare(json!({ "pong": true })));
    }

    #[test]
    fn response_split_across_chunks_is_reassembled() {
        let endpoint = spawn_peer(|mut stream| {
            let _ = read_message(&mut stream);
            stream
                .write_all(br#"{"status":"success","#)
                .expect("write head");
            stream.flush().expect("flush");
            thread::sleep(Duration::from_millis(20));
            stream
                .write_all(br#""result":{"layers":[]}}"#)
                .expect("write tail");
        });

        let mut connection = Connection::connect(&endpoint).expect("connect");
        let response = connection
            .request(&CommandEnvelope::new("get_layers"))
            .expect("request");
        assert_eq!(response, Response::success(json!({ "layers": [] })));
    }

    #[test]
    fn stream_end_mid_response_is_a_transport_error() {
        let endpoint = spawn_peer(|mut stream| {
            let _ = read_message(&mut stream);
            stream
                .write_all(br#"{"status":"success""#)
                .expect("write partial");
            // Dropping the stream closes it before the document completes.
        });

        let mut connection = Connection::connect(&endpoint).expect("connect");
        let error = connection
            .request(&CommandEnvelope::new("get_layers"))
            .expect_err("should fail");
        assert!(matches!(
            error,
            RequestError::Transport(TransportError::ClosedMidResponse)
        ));
    }

    #[test]
    fn undecodable_response_is_a_protocol_error() {
        let endpoint = spawn_peer(|mut stream| {
            let _ = read_message(&mut stream);
            stream.write_all(b"definitely not json").expect("write junk");
        });

        let mut connection = Connection::connect(&endpoint).expect("connect");
        let error = connection
            .request(&CommandEnvelope::new("ping"))
            .expect_err("should fail");
        assert!(matches!(error, RequestError::Protocol(_)));
    }

    #[test]
    fn connect_to_nothing_fails_without_retry() {
        // Bind then drop to obtain a port with no listener behind it.
        let port = {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let error = Connection::connect(&Endpoint::new("127.0.0.1", port)).expect_err("refused");
        assert!(matches!(error, ConnectError::Connect { .. }));
    }

    #[test]
    fn probe_may_report_success_after_peer_death() {
        let endpoint = spawn_peer(|mut stream| {
            let _ = read_message(&mut stream);
            stream.write_all(br#"{"pong": true}"#).expect("write");
        });

        let mut connection = Connection::connect(&endpoint).expect("connect");
        let _ = connection
            .request(&CommandEnvelope::new("ping"))
            .expect("request");
        // Give the peer thread time to drop its end.
        thread::sleep(Duration::from_millis(50));

        // The probe is best-effort and may produce a false positive; the
        // contract is only that the next request reports the failure.
        let _ = connection.probe();
        let error = connection
            .request(&CommandEnvelope::new("ping"))
            .expect_err("dead peer");
        assert!(matches!(error, RequestError::Transport(_)));
    }

    #[test]
    fn close_is_idempotent() {
        let endpoint = spawn_peer(|_stream| {});
        let mut connection = Connection::connect(&endpoint).expect("connect");
        connection.close();
        connection.close();
    }
}
