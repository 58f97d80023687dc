//! TCP endpoint addressing for the bridge socket.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Address of the peer's listening socket.
///
/// The bridge runs over plain TCP on a trusted local network; there is no
/// Unix-socket or TLS variant. Endpoints render and parse as
/// `tcp://host:port`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Builds an endpoint from a host name and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the `(host, port)` pair accepted by `ToSocketAddrs`.
    #[must_use]
    pub fn addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        if url.scheme() != "tcp" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing an [`Endpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `tcp`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing from the address.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn display_round_trips_through_parse() {
        let endpoint = Endpoint::new("localhost", 9876);
        assert_eq!(endpoint.to_string(), "tcp://localhost:9876");
        let reparsed: Endpoint = endpoint.to_string().parse().expect("reparse");
        assert_eq!(reparsed, endpoint);
    }

    #[rstest]
    #[case::wrong_scheme("unix:///tmp/bridge.sock")]
    #[case::missing_port("tcp://localhost")]
    #[case::no_url_at_all("localhost:9876")]
    fn rejects_malformed_endpoints(#[case] input: &str) {
        assert!(input.parse::<Endpoint>().is_err());
    }

    #[test]
    fn exposes_addr_pair() {
        let endpoint = Endpoint::new("127.0.0.1", 4242);
        assert_eq!(endpoint.addr(), ("127.0.0.1", 4242));
    }
}
