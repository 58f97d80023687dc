//! Command dispatch and the per-connection read/process/write loop.
//!
//! The dispatcher is stateless apart from the registry. Every accepted
//! connection is driven as a loop alternating "read one complete message →
//! dispatch → write one complete response" until the client closes the
//! stream. Malformed input is answered with an error envelope rather than
//! by closing the connection, and a handler failure — fault or panic —
//! becomes an error envelope at exactly one place. Nothing that happens on
//! a connection can crash the listener or the host process.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use mapbridge_proto::codec::{self, DecodeOutcome, FrameDecoder};
use mapbridge_proto::{CommandEnvelope, Response};

use crate::DISPATCH_TARGET;
use crate::listener::ConnectionHandler;
use crate::registry::{HandlerRegistry, Reply};

/// Upper bound on a single buffered request.
///
/// A valid-but-incomplete JSON prefix grows the decoder buffer until the
/// document completes; this cap keeps a misbehaving client from consuming
/// unbounded memory. Large payloads (code, rendered inputs) fit well under
/// it.
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

const READ_CHUNK: usize = 4096;

/// Emitted when encoding our own response fails, which should not happen
/// for values this crate builds.
const FALLBACK_ERROR: &[u8] =
    br#"{"status":"error","message":"internal error: response serialisation failed"}"#;

/// Maps decoded command frames to response envelopes via the registry.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given registry.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Turns one decoded request document into a response envelope.
    ///
    /// Envelope extraction failures, unknown command names, handler faults
    /// and handler panics all become error envelopes; this function never
    /// fails and never panics outward.
    #[must_use]
    pub fn respond(&self, frame: Value) -> Response {
        let envelope = match CommandEnvelope::from_value(frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "rejecting invalid request");
                return Response::error(format!("invalid request: {error}"));
            }
        };

        let Some(handler) = self.registry.get(envelope.name()) else {
            debug!(
                target: DISPATCH_TARGET,
                command = envelope.name(),
                "unknown command"
            );
            return Response::error(format!("unknown command: {}", envelope.name()));
        };

        debug!(
            target: DISPATCH_TARGET,
            command = envelope.name(),
            "dispatching command"
        );

        match catch_unwind(AssertUnwindSafe(|| handler.call(envelope.params()))) {
            Ok(Ok(Reply::Value(value))) => Response::success(value),
            Ok(Ok(Reply::Bare(value))) => Response::bare(value),
            Ok(Err(fault)) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = envelope.name(),
                    %fault,
                    "handler fault"
                );
                Response::error(fault.to_string())
            }
            Err(_panic) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = envelope.name(),
                    "handler panicked"
                );
                Response::error(format!("handler '{}' panicked", envelope.name()))
            }
        }
    }
}

/// Connection handler that runs the dispatch loop over a client socket.
#[derive(Debug)]
pub struct DispatchConnectionHandler {
    dispatcher: Dispatcher,
}

impl DispatchConnectionHandler {
    /// Creates a handler dispatching into the given registry.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
        }
    }

    fn serve(&self, mut stream: TcpStream) {
        let client = stream
            .peer_addr()
            .map_or_else(|_| "<unknown>".to_owned(), |addr| addr.to_string());
        debug!(target: DISPATCH_TARGET, %client, "client connected");

        let mut decoder = FrameDecoder::new();
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            let bytes_read = match read_with_retry(&mut stream, &mut chunk) {
                Ok(read) => read,
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %client, %error, "failed to read request");
                    return;
                }
            };
            if bytes_read == 0 {
                // End-of-stream: the client is done (or gave up on an
                // in-flight request); discard any partial message.
                debug!(target: DISPATCH_TARGET, %client, "client disconnected");
                return;
            }

            let response = match decoder.feed(&chunk[..bytes_read]) {
                DecodeOutcome::NeedMore => {
                    if decoder.buffered() > MAX_REQUEST_BYTES {
                        warn!(
                            target: DISPATCH_TARGET,
                            %client,
                            buffered = decoder.buffered(),
                            "request exceeds maximum size; closing connection"
                        );
                        let oversize = Response::error(format!(
                            "request exceeds {MAX_REQUEST_BYTES} byte limit"
                        ));
                        let _ = write_response(&mut stream, oversize);
                        return;
                    }
                    continue;
                }
                DecodeOutcome::Complete(frame) => self.dispatcher.respond(frame),
                DecodeOutcome::Failed(error) => {
                    warn!(target: DISPATCH_TARGET, %client, %error, "malformed request");
                    Response::error(format!("malformed request: {error}"))
                }
            };

            if let Err(error) = write_response(&mut stream, response) {
                warn!(target: DISPATCH_TARGET, %client, %error, "failed to write response");
                return;
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        self.serve(stream);
    }
}

fn write_response(stream: &mut TcpStream, response: Response) -> io::Result<()> {
    let payload = match codec::encode(&response.into_value()) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(target: DISPATCH_TARGET, %error, "failed to encode response");
            FALLBACK_ERROR.to_vec()
        }
    };
    stream.write_all(&payload)?;
    stream.flush()
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
    use serde_json::{Map, json};

    use mapbridge_proto::commands;

    use crate::registry::HandlerFault;

    use super::*;

    fn test_registry() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        registry.register(commands::PING, |_: &Map<String, Value>| {
            Ok(Reply::bare(json!({ "pong": true })))
        });
        registry.register(commands::GET_LAYERS, |_: &Map<String, Value>| {
            Ok(Reply::value(json!({ "layers": [] })))
        });
        registry.register("echo_path", |params: &Map<String, Value>| {
            params
                .get("path")
                .cloned()
                .map(Reply::Value)
                .ok_or_else(|| HandlerFault::new("missing 'path' parameter"))
        });
        registry.register("explode", |_: &Map<String, Value>| -> Result<Reply, HandlerFault> {
            panic!("handler bug")
        });
        Arc::new(registry)
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(test_registry())
    }

    #[test]
    fn wraps_handler_value_in_success_envelope() {
        let response = dispatcher().respond(json!({ "type": "get_layers", "params": {} }));
        assert_eq!(response, Response::success(json!({ "layers": [] })));
    }

    #[test]
    fn bare_replies_skip_the_status_wrapper() {
        let response = dispatcher().respond(json!({ "type": "ping" }));
        assert_eq!(response, Response::Bare(json!({ "pong": true })));
    }

    #[test]
    fn params_reach_the_handler() {
        let response = dispatcher().respond(json!({
            "type": "echo_path",
            "params": { "path": "/data/demo.gpkg" }
        }));
        assert_eq!(response, Response::success(json!("/data/demo.gpkg")));
    }

    #[test]
    fn unknown_command_is_named_in_the_error() {
        let response = dispatcher().respond(json!({ "type": "make_coffee", "params": {} }));
        let Response::Error { message } = response else {
            panic!("expected an error envelope");
        };
        assert!(message.contains("make_coffee"));
    }

    #[test]
    fn missing_type_is_an_error_envelope() {
        let response = dispatcher().respond(json!({ "params": {} }));
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn handler_fault_becomes_an_error_envelope() {
        let response = dispatcher().respond(json!({ "type": "echo_path", "params": {} }));
        assert_eq!(response, Response::error("missing 'path' parameter"));
    }

    #[test]
    fn handler_panic_is_contained() {
        let response = dispatcher().respond(json!({ "type": "explode" }));
        let Response::Error { message } = response else {
            panic!("expected an error envelope");
        };
        assert!(message.contains("explode"));
        // The dispatcher survives and keeps serving.
        let response = dispatcher().respond(json!({ "type": "ping" }));
        assert_eq!(response, Response::Bare(json!({ "pong": true })));
    }
}
