//! Error types for broker communication.

use thiserror::Error;

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors that can occur while talking to the device broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The client is misconfigured (e.g. missing base URL).
    #[error("broker configuration error: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The transport failed on every attempt (connect/read errors).
    #[error("broker transport failure after {attempts} attempts: {source}")]
    Transport {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The final underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The broker answered with a non-success status that is not retryable,
    /// or retries were exhausted.
    #[error("broker call failed with status {status} after {attempts} attempts")]
    Http {
        /// HTTP status of the final attempt.
        status: u16,
        /// Response body of the final attempt.
        body: String,
        /// Total attempts made.
        attempts: u32,
    },

    /// A 2xx response body could not be parsed as the dictionary promised.
    ///
    /// Not retried: the response is assumed deterministic.
    #[error("failed to parse broker response: {message}")]
    ResponseParse {
        /// Parse failure detail.
        message: String,
    },

    /// Signing or encoding an auth token failed.
    #[error("auth token construction failed: {message}")]
    Auth {
        /// Failure detail.
        message: String,
    },
}

impl BrokerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a response-parse error.
    pub fn response_parse(message: impl Into<String>) -> Self {
        Self::ResponseParse {
            message: message.into(),
        }
    }
}
