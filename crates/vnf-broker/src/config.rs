//! Broker client configuration.
//!
//! All values are supplied by whatever composes the system (daemon flags,
//! host configuration); the client itself owns no global state.

use std::time::Duration;

/// Credentials for broker authentication.
#[derive(Debug, Clone, Default)]
pub enum AuthCredentials {
    /// No authentication header.
    #[default]
    None,
    /// HTTP basic authentication.
    Basic {
        /// Username sent in the basic credential pair.
        username: String,
        /// Password sent in the basic credential pair.
        password: String,
    },
    /// Static bearer token.
    Bearer {
        /// The token, sent as `Bearer <token>`.
        token: String,
    },
    /// Short-lived JWT minted per logical call, HS256-signed.
    Jwt {
        /// Signing secret shared with the broker.
        secret: Vec<u8>,
        /// Token issuer claim.
        issuer: String,
        /// Token subject claim.
        subject: String,
    },
}

/// Configuration for [`crate::BrokerClient`].
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker base URL, e.g. `https://10.0.0.1:8443`.
    pub base_url: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Per-request read timeout.
    pub read_timeout: Duration,
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles each retry.
    pub initial_backoff: Duration,
    /// Upper bound on the backoff delay.
    pub max_backoff: Duration,
    /// Authentication scheme and credentials.
    pub auth: AuthCredentials,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            auth: AuthCredentials::None,
        }
    }
}

impl BrokerConfig {
    /// Creates a configuration with the given base URL and defaults for the
    /// rest.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_millis(1000));
        assert_eq!(config.max_backoff, Duration::from_millis(30_000));
        assert!(matches!(config.auth, AuthCredentials::None));
    }
}
