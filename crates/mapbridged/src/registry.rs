//! Command handler registry.
//!
//! The registry maps command names to handler capabilities. It is populated
//! by the host application before the listener starts and is fixed from
//! then on — the protocol offers no dynamic registration. Names are
//! case-sensitive and unique; registering a name twice replaces the earlier
//! handler, which only ever happens during startup wiring.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// A failure raised by a command handler.
///
/// Faults are data, not control flow: the dispatcher converts every fault
/// into an error envelope at the single point where handlers are invoked,
/// and nothing propagates further.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerFault {
    message: String,
}

impl HandlerFault {
    /// Creates a fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerFault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerFault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Successful handler output.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A value the dispatcher wraps in the structured success envelope.
    Value(Value),
    /// A legacy payload sent on the wire exactly as produced, without a
    /// `status` wrapper.
    Bare(Value),
}

impl Reply {
    /// Builds a reply that will be wrapped in the success envelope.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Builds a legacy bare reply.
    #[must_use]
    pub fn bare(value: impl Into<Value>) -> Self {
        Self::Bare(value.into())
    }
}

/// A unit of business logic invoked by command name.
///
/// Handlers receive the opaque parameter mapping from the command envelope
/// and either produce a [`Reply`] or raise a [`HandlerFault`]. They run on
/// the listener's thread and may take arbitrarily long.
pub trait CommandHandler: Send + Sync + 'static {
    /// Executes the command with the supplied parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerFault`] describing the failure; the dispatcher
    /// converts it into an error envelope.
    fn call(&self, params: &Map<String, Value>) -> Result<Reply, HandlerFault>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Map<String, Value>) -> Result<Reply, HandlerFault> + Send + Sync + 'static,
{
    fn call(&self, params: &Map<String, Value>) -> Result<Reply, HandlerFault> {
        self(params)
    }
}

/// Case-sensitive mapping from command name to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under the given command name.
    ///
    /// Registering an already-present name replaces the earlier handler.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Looks up the handler for a command name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn CommandHandler> {
        self.handlers.get(name).map(Box::as_ref)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true when no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Iterates over the registered command names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        formatter
            .debug_struct("HandlerRegistry")
            .field("commands", &names)
            .finish()
    }
}
