//! Error types for dictionary parsing and request construction.

use thiserror::Error;

/// Errors raised while parsing dictionary YAML into the typed tree.
///
/// These are hard failures: a dictionary that fails to parse is rejected
/// outright and never reaches validation or request building.
#[derive(Debug, Error)]
pub enum DictionaryParseError {
    /// The submitted content was empty or whitespace only.
    #[error("dictionary content is empty")]
    Empty,

    /// The submitted content exceeds the configured size limit.
    #[error("dictionary content is {size} bytes, exceeds maximum of {max}")]
    TooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },

    /// The content is not well-formed YAML.
    #[error("invalid YAML syntax: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// The YAML root is not a mapping.
    #[error("dictionary root must be a mapping")]
    InvalidRoot,

    /// A required top-level section is missing.
    #[error("missing required '{section}' section")]
    MissingSection {
        /// Name of the missing section (`services`, `vendor`, `product`).
        section: String,
    },
}

impl DictionaryParseError {
    /// Creates a missing-section error.
    pub fn missing_section(section: impl Into<String>) -> Self {
        Self::MissingSection {
            section: section.into(),
        }
    }
}

/// Errors raised while building a wire request from a dictionary.
///
/// Build failures abort only the single intent they belong to; they never
/// affect sibling intents or a reconciliation run in progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestBuildError {
    /// The dictionary defines no service with this name.
    #[error("unknown service '{service}'")]
    UnknownService {
        /// The requested service name.
        service: String,
    },

    /// The service defines no operation with this name.
    #[error("service '{service}' has no operation '{operation}'")]
    UnknownOperation {
        /// The service that was found.
        service: String,
        /// The requested operation name.
        operation: String,
    },

    /// The operation has no endpoint (or command, for CLI operations).
    #[error("service '{service}', operation '{operation}': missing endpoint")]
    MissingEndpoint {
        /// The service name.
        service: String,
        /// The operation name.
        operation: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = DictionaryParseError::missing_section("services");
        assert_eq!(err.to_string(), "missing required 'services' section");

        let err = DictionaryParseError::TooLarge {
            size: 2048,
            max: 1024,
        };
        assert_eq!(
            err.to_string(),
            "dictionary content is 2048 bytes, exceeds maximum of 1024"
        );
    }

    #[test]
    fn test_build_error_display() {
        let err = RequestBuildError::UnknownOperation {
            service: "firewall".to_string(),
            operation: "purge".to_string(),
        };
        assert_eq!(err.to_string(), "service 'firewall' has no operation 'purge'");
    }
}
