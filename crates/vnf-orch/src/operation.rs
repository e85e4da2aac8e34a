//! Operation records and their state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{OrchError, OrchResult};
use crate::intent::RuleIntent;

/// The kind of device mutation or query an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationType {
    /// Create a rule on the device.
    Create,
    /// Update an existing rule.
    Update,
    /// Delete a rule.
    Delete,
    /// Query device state.
    List,
}

impl OperationType {
    /// Canonical name used in hashing and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::List => "list",
        }
    }
}

/// Lifecycle state of an operation.
///
/// States only move forward: Pending -> InProgress -> terminal. A build
/// failure may terminate an operation straight from Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    /// Created, broker call not yet started.
    Pending,
    /// Broker call in flight.
    InProgress,
    /// The device accepted the operation.
    Completed,
    /// The operation failed terminally.
    Failed,
    /// The operation timed out terminally.
    TimedOut,
}

impl OperationState {
    /// Canonical state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "Pending",
            OperationState::InProgress => "InProgress",
            OperationState::Completed => "Completed",
            OperationState::Failed => "Failed",
            OperationState::TimedOut => "TimedOut",
        }
    }

    /// Returns true for Completed/Failed/TimedOut.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::TimedOut
        )
    }

    /// Returns true if the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        match self {
            OperationState::Pending => next != OperationState::Pending,
            OperationState::InProgress => next.is_terminal(),
            _ => false,
        }
    }
}

/// One tracked intent execution against a device.
///
/// Operations are never physically deleted by this core; an external
/// cleanup job soft-retires old records.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// Unique operation id.
    pub id: String,
    /// The appliance this operation targets.
    pub vnf_instance_id: String,
    /// What the operation does.
    pub operation_type: OperationType,
    /// The dictionary service involved.
    pub service: String,
    /// The dictionary operation name invoked.
    pub operation_name: String,
    /// Idempotency and correlation key.
    pub rule_id: String,
    /// Versioned hash of the canonical intent encoding.
    pub content_hash: String,
    /// Current lifecycle state.
    pub state: OperationState,
    /// Snapshot of the built wire request.
    pub request_payload: Option<String>,
    /// Snapshot of the raw device response.
    pub response_payload: Option<String>,
    /// Vendor-assigned external reference for the rule.
    pub vendor_ref: Option<String>,
    /// Error classification on failure.
    pub error_code: Option<String>,
    /// Human-readable failure detail.
    pub error_message: Option<String>,
    /// When the operation record was created.
    pub created_at: DateTime<Utc>,
    /// When the broker call started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the operation reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Operation {
    /// Creates a Pending operation for an intent.
    pub fn new(intent: &RuleIntent, content_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vnf_instance_id: intent.vnf_instance_id.clone(),
            operation_type: intent.operation_type,
            service: intent.service.clone(),
            operation_name: intent.operation.clone(),
            rule_id: intent.rule_id.clone(),
            content_hash: content_hash.into(),
            state: OperationState::Pending,
            request_payload: None,
            response_payload: None,
            vendor_ref: None,
            error_code: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Moves the operation to `next`, stamping timestamps.
    ///
    /// Fails if the transition would regress the state machine.
    pub fn transition(&mut self, next: OperationState) -> OrchResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(OrchError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        match next {
            OperationState::InProgress => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    /// Terminates the operation as Completed.
    pub fn complete(&mut self, vendor_ref: Option<String>) -> OrchResult<()> {
        self.vendor_ref = vendor_ref;
        self.transition(OperationState::Completed)
    }

    /// Terminates the operation as Failed with a classification.
    pub fn fail(&mut self, code: impl Into<String>, message: impl Into<String>) -> OrchResult<()> {
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        self.transition(OperationState::Failed)
    }

    /// Terminates the operation as TimedOut.
    pub fn time_out(&mut self, message: impl Into<String>) -> OrchResult<()> {
        self.error_code = Some("TIMEOUT".to_string());
        self.error_message = Some(message.into());
        self.transition(OperationState::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn intent() -> RuleIntent {
        RuleIntent {
            vnf_instance_id: "appliance-1".to_string(),
            rule_id: "r-1".to_string(),
            service: "firewall".to_string(),
            operation: "create".to_string(),
            operation_type: OperationType::Create,
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut op = Operation::new(&intent(), "v1:abc");
        assert_eq!(op.state, OperationState::Pending);
        assert!(op.started_at.is_none());

        op.transition(OperationState::InProgress).unwrap();
        assert!(op.started_at.is_some());
        assert!(op.completed_at.is_none());

        op.complete(Some("fw-9".to_string())).unwrap();
        assert_eq!(op.state, OperationState::Completed);
        assert_eq!(op.vendor_ref.as_deref(), Some("fw-9"));
        assert!(op.completed_at.is_some());
    }

    #[test]
    fn test_pending_may_fail_directly() {
        let mut op = Operation::new(&intent(), "v1:abc");
        op.fail("BUILD_FAILED", "unknown service 'vpn'").unwrap();
        assert_eq!(op.state, OperationState::Failed);
        assert_eq!(op.error_code.as_deref(), Some("BUILD_FAILED"));
        assert!(op.completed_at.is_some());
    }

    #[test]
    fn test_terminal_states_never_regress() {
        let mut op = Operation::new(&intent(), "v1:abc");
        op.transition(OperationState::InProgress).unwrap();
        op.complete(None).unwrap();

        let err = op.transition(OperationState::InProgress).unwrap_err();
        assert!(matches!(err, OrchError::InvalidTransition { .. }));
        let err = op.fail("X", "y").unwrap_err();
        assert!(matches!(err, OrchError::InvalidTransition { .. }));
        assert_eq!(op.state, OperationState::Completed);
    }

    #[test]
    fn test_in_progress_only_terminates() {
        let mut op = Operation::new(&intent(), "v1:abc");
        op.transition(OperationState::InProgress).unwrap();
        let err = op.transition(OperationState::Pending).unwrap_err();
        assert!(matches!(err, OrchError::InvalidTransition { .. }));

        op.transition(OperationState::TimedOut).unwrap();
        assert!(op.state.is_terminal());
    }
}
