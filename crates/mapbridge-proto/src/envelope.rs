//! Command and response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::ProtocolError;

/// Request payload sent from the client to the peer.
///
/// The `type` field names a handler registered on the peer; `params` is an
/// opaque mapping interpreted by that handler and defaults to empty. The
/// envelope is immutable once built — construct a fresh one per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Name of the command handler to invoke.
    #[serde(rename = "type")]
    name: String,
    /// Handler parameters, opaque to the transport core.
    #[serde(default)]
    params: Map<String, Value>,
}

impl CommandEnvelope {
    /// Builds an envelope with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Replaces the parameter mapping wholesale.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Adds a single parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns the command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter mapping.
    #[must_use]
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Extracts an envelope from a decoded JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidEnvelope`] when the document does not
    /// match the envelope schema and [`ProtocolError::EmptyCommandName`]
    /// when the `type` field is present but blank.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let envelope: Self =
            serde_json::from_value(value).map_err(ProtocolError::InvalidEnvelope)?;
        if envelope.name.trim().is_empty() {
            return Err(ProtocolError::EmptyCommandName);
        }
        Ok(envelope)
    }
}

/// Response payload sent from the peer to the client.
///
/// Structured responses carry a `status` discriminant; legacy handlers may
/// instead return a bare document without one, which callers must treat as
/// an unstructured success with the whole document as the result.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Structured success carrying a result value.
    Success {
        /// Handler-produced result, any JSON value.
        result: Value,
    },
    /// Structured failure carrying a human-readable message.
    Error {
        /// Description of what went wrong.
        message: String,
    },
    /// Legacy payload without a `status` key.
    Bare(Value),
}

impl Response {
    /// Builds a structured success response.
    #[must_use]
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success {
            result: result.into(),
        }
    }

    /// Builds a structured error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wraps a legacy payload that is sent without a `status` wrapper.
    #[must_use]
    pub fn bare(value: impl Into<Value>) -> Self {
        Self::Bare(value.into())
    }

    /// Classifies a decoded JSON document.
    ///
    /// A document with `"status": "success"` or `"status": "error"` maps to
    /// the structured variants; anything else — including non-objects and
    /// objects whose `status` is unrecognised — is a bare payload.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value.get("status").and_then(Value::as_str) {
            Some("success") => Self::Success {
                result: value.get("result").cloned().unwrap_or(Value::Null),
            },
            Some("error") => Self::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified error")
                    .to_owned(),
            },
            _ => Self::Bare(value),
        }
    }

    /// Produces the wire shape of this response.
    ///
    /// Bare payloads pass through untouched; the structured variants gain
    /// their `status` discriminant.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Success { result } => json!({ "status": "success", "result": result }),
            Self::Error { message } => json!({ "status": "error", "message": message }),
            Self::Bare(value) => value,
        }
    }

    /// Converts the response into the caller-facing result.
    ///
    /// Success and bare payloads both resolve to their value; error
    /// responses resolve to the peer's message.
    ///
    /// # Errors
    ///
    /// Returns the error message when the peer reported a failure.
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Self::Success { result } => Ok(result),
            Self::Bare(value) => Ok(value),
            Self::Error { message } => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn envelope_serialises_with_type_field() {
        let envelope = CommandEnvelope::new("load_project").with_param("path", "/data/demo.gpkg");
        let value = serde_json::to_value(&envelope).expect("serialise");
        assert_eq!(
            value,
            json!({ "type": "load_project", "params": { "path": "/data/demo.gpkg" } })
        );
    }

    #[test]
    fn envelope_params_default_to_empty() {
        let envelope = CommandEnvelope::from_value(json!({ "type": "ping" })).expect("extract");
        assert_eq!(envelope.name(), "ping");
        assert!(envelope.params().is_empty());
    }

    #[test]
    fn envelope_rejects_missing_type() {
        let error =
            CommandEnvelope::from_value(json!({ "params": {} })).expect_err("should reject");
        assert!(matches!(error, ProtocolError::InvalidEnvelope(_)));
    }

    #[test]
    fn envelope_rejects_blank_type() {
        let error =
            CommandEnvelope::from_value(json!({ "type": "  " })).expect_err("should reject");
        assert!(matches!(error, ProtocolError::EmptyCommandName));
    }

    #[test]
    fn success_round_trips_through_wire_shape() {
        let response = Response::success(json!({ "layers": [] }));
        let value = response.clone().into_value();
        assert_eq!(Response::from_value(value), response);
    }

    #[test]
    fn error_shape_carries_message() {
        let value = Response::error("no such layer").into_value();
        assert_eq!(
            value,
            json!({ "status": "error", "message": "no such layer" })
        );
    }

    #[rstest]
    #[case::plain_object(json!({ "pong": true }))]
    #[case::unrecognised_status(json!({ "status": "partial", "n": 1 }))]
    #[case::non_object(json!([1, 2, 3]))]
    fn documents_without_structured_status_are_bare(#[case] value: Value) {
        assert_eq!(Response::from_value(value.clone()), Response::Bare(value));
    }

    #[test]
    fn bare_payload_passes_through_untouched() {
        let value = json!({ "pong": true });
        assert_eq!(Response::bare(value.clone()).into_value(), value);
    }

    #[test]
    fn into_result_unwraps_both_success_shapes() {
        assert_eq!(
            Response::success(json!(7)).into_result().ok(),
            Some(json!(7))
        );
        assert_eq!(
            Response::bare(json!({ "pong": true })).into_result().ok(),
            Some(json!({ "pong": true }))
        );
        assert!(Response::error("boom").into_result().is_err());
    }
}
