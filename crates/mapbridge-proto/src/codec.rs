//! Parse-based message framing.
//!
//! The wire format carries no length prefix and no delimiter, so message
//! boundaries are delegated to the JSON parser: the decoder accumulates
//! bytes and a message is complete the instant the buffer parses as a
//! single JSON document.
//!
//! This inherits a structural boundary risk from the wire format. A
//! well-formed single JSON object or array cannot have a strict prefix that
//! parses on its own, but a top-level scalar can (`12` completes before a
//! later `3` arrives), and two messages concatenated without a separator
//! will confuse the boundary search. Early decode success is authoritative
//! by design; concatenated messages are explicitly unsupported. Peers that
//! need stronger guarantees must change the wire format, which is out of
//! scope here.

use serde_json::Value;

use crate::ProtocolError;

/// Serialises a value to its UTF-8 JSON wire form.
///
/// No delimiter or length prefix is appended.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] when serialisation fails.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(ProtocolError::Encode)
}

/// Outcome of feeding bytes to a [`FrameDecoder`].
#[derive(Debug)]
pub enum DecodeOutcome {
    /// The accumulated bytes parse as a complete JSON document.
    Complete(Value),
    /// The accumulated bytes are a valid prefix; more input is required.
    NeedMore,
    /// The accumulated bytes can never become a valid document.
    Failed(ProtocolError),
}

/// Incremental decoder that finds message boundaries by attempted parsing.
///
/// Feed each received chunk; the decoder resets itself after reporting
/// [`DecodeOutcome::Complete`] or [`DecodeOutcome::Failed`] so it can be
/// reused for the next message on the same stream.
///
/// End-of-stream is not the decoder's concern: a zero-length read while a
/// message is pending must be treated by the caller as a transport failure,
/// never fed here and never reported as an empty document.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and attempts to parse the accumulated bytes.
    pub fn feed(&mut self, chunk: &[u8]) -> DecodeOutcome {
        self.buffer.extend_from_slice(chunk);
        match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(value) => {
                self.buffer.clear();
                DecodeOutcome::Complete(value)
            }
            Err(error) if error.is_eof() => DecodeOutcome::NeedMore,
            Err(error) => {
                self.buffer.clear();
                DecodeOutcome::Failed(ProtocolError::MalformedFrame(error))
            }
        }
    }

    /// Returns true when no partial message is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of bytes buffered for the in-progress message.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
