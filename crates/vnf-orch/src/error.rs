//! Error types for the orchestration core.

use thiserror::Error;

use vnf_broker::BrokerError;
use vnf_dictionary::{DictionaryParseError, RequestBuildError};

/// Result type alias for orchestration operations.
pub type OrchResult<T> = Result<T, OrchError>;

/// Errors surfaced by dispatch, reconciliation, and the dictionary registry.
#[derive(Debug, Error)]
pub enum OrchError {
    /// A non-terminal operation already exists for this rule id.
    #[error("duplicate in-flight intent for rule id '{rule_id}'")]
    Conflict {
        /// The contended rule id.
        rule_id: String,
    },

    /// An operation state transition would regress the state machine.
    #[error("invalid operation state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the operation is in.
        from: &'static str,
        /// State the caller attempted.
        to: &'static str,
    },

    /// No completed create operation exists for this rule id.
    #[error("no completed create operation found for rule id '{rule_id}'")]
    RuleNotFound {
        /// The rule id that was looked up.
        rule_id: String,
    },

    /// A dictionary upload failed hard validation.
    #[error("dictionary validation failed: {}", errors.join("; "))]
    InvalidDictionary {
        /// The hard validation errors.
        errors: Vec<String>,
    },

    /// Dictionary YAML could not be parsed.
    #[error(transparent)]
    Parse(#[from] DictionaryParseError),

    /// A wire request could not be built.
    #[error(transparent)]
    Build(#[from] RequestBuildError),

    /// Broker communication failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A backing store failed.
    #[error("store operation failed: {message}")]
    Store {
        /// Failure detail.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchError::Conflict {
            rule_id: "r-1".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate in-flight intent for rule id 'r-1'");

        let err = OrchError::InvalidDictionary {
            errors: vec!["No services defined".to_string(), "Invalid port".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "dictionary validation failed: No services defined; Invalid port"
        );
    }
}
