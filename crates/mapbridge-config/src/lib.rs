//! Shared configuration for the MapBridge client and peer.
//!
//! Both sides of the bridge agree on a socket endpoint and on how logging is
//! filtered and formatted. Configuration values are resolved from the
//! environment with an injectable lookup seam so tests can supply values
//! without mutating process state; the peer binary layers its CLI flags on
//! top of the loaded configuration.

mod defaults;
mod endpoint;
mod logging;

use thiserror::Error;

pub use defaults::{DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, default_endpoint};
pub use endpoint::{Endpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Environment variable naming the socket endpoint (`tcp://host:port`).
pub const ENDPOINT_VAR: &str = "MAPBRIDGE_ENDPOINT";
/// Environment variable naming the log filter expression.
pub const LOG_FILTER_VAR: &str = "MAPBRIDGE_LOG_FILTER";
/// Environment variable naming the log output format.
pub const LOG_FORMAT_VAR: &str = "MAPBRIDGE_LOG_FORMAT";

/// Resolved configuration shared by the client and the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    endpoint: Endpoint,
    log_filter: String,
    log_format: LogFormat,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when an environment value fails to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through the supplied lookup function.
    ///
    /// Absent keys fall back to the defaults; present keys must parse.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a looked-up value fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = match lookup(ENDPOINT_VAR) {
            Some(raw) => raw
                .parse()
                .map_err(|source| ConfigError::Endpoint { raw, source })?,
            None => default_endpoint(),
        };
        let log_filter = lookup(LOG_FILTER_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());
        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw
                .parse()
                .map_err(|source| ConfigError::LogFormat { raw, source })?,
            None => LogFormat::default(),
        };
        Ok(Self {
            endpoint,
            log_filter,
            log_format,
        })
    }

    /// Returns the configured socket endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Replaces the socket endpoint, e.g. from a CLI override.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoint = endpoint;
    }

    /// Returns the log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Replaces the log filter expression.
    pub fn set_log_filter(&mut self, filter: String) {
        self.log_filter = filter;
    }

    /// Returns the log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Replaces the log output format.
    pub fn set_log_format(&mut self, format: LogFormat) {
        self.log_format = format;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: LogFormat::default(),
        }
    }
}

/// Errors encountered while resolving configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The endpoint value failed to parse.
    #[error("invalid endpoint '{raw}': {source}")]
    Endpoint {
        /// The offending value.
        raw: String,
        /// Underlying parse failure.
        #[source]
        source: EndpointParseError,
    },
    /// The log format value failed to parse.
    #[error("invalid log format '{raw}': {source}")]
    LogFormat {
        /// The offending value.
        raw: String,
        /// Underlying parse failure.
        #[source]
        source: LogFormatParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None).expect("load defaults");
        assert_eq!(config.endpoint(), &default_endpoint());
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::default());
    }

    #[test]
    fn environment_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (ENDPOINT_VAR, "tcp://10.0.0.5:4242"),
            (LOG_FILTER_VAR, "debug"),
            (LOG_FORMAT_VAR, "compact"),
        ]))
        .expect("load overrides");
        assert_eq!(config.endpoint().to_string(), "tcp://10.0.0.5:4242");
        assert_eq!(config.log_filter(), "debug");
        assert_eq!(config.log_format(), LogFormat::Compact);
    }

    #[test]
    fn invalid_endpoint_is_reported_with_the_value() {
        let error = Config::from_lookup(lookup_from(&[(ENDPOINT_VAR, "not-a-url")]))
            .expect_err("should reject");
        assert!(matches!(error, ConfigError::Endpoint { .. }));
        assert!(error.to_string().contains("not-a-url"));
    }

    #[test]
    fn invalid_log_format_is_rejected() {
        let error = Config::from_lookup(lookup_from(&[(LOG_FORMAT_VAR, "fancy")]))
            .expect_err("should reject");
        assert!(matches!(error, ConfigError::LogFormat { .. }));
    }
}
