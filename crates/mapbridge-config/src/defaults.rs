//! Default configuration values shared by both sides of the bridge.

use crate::endpoint::Endpoint;

/// Default host the peer listens on.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port of the bridge socket.
pub const DEFAULT_PORT: u16 = 9876;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Computes the default socket endpoint for the bridge.
#[must_use]
pub fn default_endpoint() -> Endpoint {
    Endpoint::new(DEFAULT_HOST, DEFAULT_PORT)
}
