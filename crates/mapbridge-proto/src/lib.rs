//! Wire types and message codec for the MapBridge protocol.
//!
//! Each logical message on the bridge socket is one UTF-8 JSON document with
//! no length prefix and no delimiter. The client sends a
//! [`CommandEnvelope`] (`{"type": ..., "params": {...}}`) and the peer
//! answers with a [`Response`] — either the structured
//! `{"status": "success"|"error", ...}` shape or a bare legacy payload
//! without a `status` key.
//!
//! Because the wire carries no framing metadata, message boundaries are
//! found by attempted parsing: [`codec::FrameDecoder`] feeds growing byte
//! prefixes to the JSON parser and declares a message complete the instant
//! the accumulated bytes parse. See the decoder documentation for the
//! boundary caveats this inherits.

pub mod codec;
pub mod commands;
mod envelope;

pub use envelope::{CommandEnvelope, Response};

use thiserror::Error;

/// Errors for well-formed byte streams that do not carry a valid message.
///
/// Protocol errors are always recoverable: the peer answers them with an
/// error envelope and the client surfaces them as a failed call. They never
/// terminate a process.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A value could not be serialised to JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// Accumulated bytes can never parse as a JSON document.
    #[error("malformed message: {0}")]
    MalformedFrame(#[source] serde_json::Error),
    /// A decoded document does not match the command envelope schema.
    #[error("invalid command envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),
    /// The command name is missing or empty.
    #[error("command envelope has an empty 'type' field")]
    EmptyCommandName,
}
