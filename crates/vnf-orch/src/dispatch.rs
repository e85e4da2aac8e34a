//! Idempotent intent dispatch.
//!
//! One dispatch turns a [`RuleIntent`] into at most one broker call,
//! deduplicated by rule id and content hash, and records the outcome as an
//! [`Operation`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use vnf_broker::{extract_error_message, extract_external_id, is_success, parse_body, Broker, BrokerError};
use vnf_dictionary::{RequestBuilder, VendorDictionary};

use crate::error::{OrchError, OrchResult};
use crate::intent::{content_hash, RuleIntent};
use crate::operation::{Operation, OperationState, OperationType};
use crate::store::OperationStore;

/// Dispatches rule intents through the build/execute/parse pipeline with
/// at-most-once semantics per rule id.
///
/// Dispatch is check-then-act: the store is consulted, then written. The
/// caller guarantees at most one in-flight submission per rule id; the
/// dispatcher does not lock.
pub struct Dispatcher {
    dictionary: Arc<VendorDictionary>,
    broker: Arc<dyn Broker>,
    store: Arc<dyn OperationStore>,
}

impl Dispatcher {
    /// Creates a dispatcher over one dictionary, broker, and store.
    pub fn new(
        dictionary: Arc<VendorDictionary>,
        broker: Arc<dyn Broker>,
        store: Arc<dyn OperationStore>,
    ) -> Self {
        Self {
            dictionary,
            broker,
            store,
        }
    }

    /// Applies a mutating intent.
    ///
    /// A completed operation with the same rule id (or the same content
    /// hash under a different rule id) is returned as-is without contacting
    /// the broker. An in-flight operation for the rule id is a
    /// [`OrchError::Conflict`]. Build and broker failures terminate the
    /// operation as Failed and are returned, not raised.
    pub async fn apply_intent(&self, intent: RuleIntent) -> OrchResult<Operation> {
        self.dispatch(intent, true).await
    }

    /// Re-applies an intent whose effect the device has lost.
    ///
    /// Reconciliation has observed that the rule is absent, so the
    /// completed-operation short-circuit is skipped; conflict detection
    /// still applies.
    pub async fn reapply_intent(&self, intent: RuleIntent) -> OrchResult<Operation> {
        self.dispatch(intent, false).await
    }

    /// Deletes the rule previously created under `rule_id`.
    ///
    /// The prior completed create operation supplies the appliance, the
    /// service, and the vendor-assigned external id for the delete
    /// templates.
    pub async fn delete_intent(&self, rule_id: &str) -> OrchResult<Operation> {
        let create_op = self
            .store
            .find_by_rule_id(rule_id, OperationType::Create)
            .await?
            .filter(|op| op.state == OperationState::Completed)
            .ok_or_else(|| OrchError::RuleNotFound {
                rule_id: rule_id.to_string(),
            })?;

        let mut variables = BTreeMap::new();
        if let Some(vendor_ref) = &create_op.vendor_ref {
            variables.insert("externalId".to_string(), vendor_ref.clone());
        }

        let intent = RuleIntent {
            vnf_instance_id: create_op.vnf_instance_id.clone(),
            rule_id: rule_id.to_string(),
            service: create_op.service.clone(),
            operation: "delete".to_string(),
            operation_type: OperationType::Delete,
            variables,
        };
        self.dispatch(intent, true).await
    }

    async fn dispatch(&self, intent: RuleIntent, dedupe_completed: bool) -> OrchResult<Operation> {
        let hash = content_hash(&intent);

        if let Some(existing) = self
            .store
            .find_by_rule_id(&intent.rule_id, intent.operation_type)
            .await?
        {
            match existing.state {
                OperationState::Completed if dedupe_completed => {
                    debug!(
                        rule_id = %intent.rule_id,
                        operation_id = %existing.id,
                        "returning stored result for completed rule id"
                    );
                    return Ok(existing);
                }
                OperationState::Pending | OperationState::InProgress => {
                    return Err(OrchError::Conflict {
                        rule_id: intent.rule_id.clone(),
                    });
                }
                _ => {}
            }
        }

        if dedupe_completed {
            if let Some(existing) = self.store.find_by_content_hash(&hash).await? {
                if existing.state == OperationState::Completed {
                    debug!(
                        rule_id = %intent.rule_id,
                        prior_rule_id = %existing.rule_id,
                        "returning stored result for identical content hash"
                    );
                    return Ok(existing);
                }
            }
        }

        let mut op = Operation::new(&intent, hash);

        let request = match RequestBuilder::build(
            &self.dictionary,
            &intent.service,
            &intent.operation,
            &intent.context(),
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!(rule_id = %intent.rule_id, error = %e, "request build failed");
                op.fail("BUILD_FAILED", e.to_string())?;
                self.store.insert(op.clone()).await?;
                return Ok(op);
            }
        };
        op.request_payload = serde_json::to_string(&request).ok();

        self.store.insert(op.clone()).await?;
        op.transition(OperationState::InProgress)?;
        self.store.update(&op).await?;

        let operation_name = format!("{}.{}", intent.service, intent.operation);
        match self.broker.execute(&request, &operation_name).await {
            Err(e) => {
                if let BrokerError::Http { body, .. } = &e {
                    op.response_payload = Some(body.clone());
                }
                let timed_out = matches!(
                    &e,
                    BrokerError::Transport { source, .. } if source.is_timeout()
                );
                if timed_out {
                    warn!(rule_id = %intent.rule_id, error = %e, "broker call timed out");
                    op.time_out(e.to_string())?;
                } else {
                    let code = match &e {
                        BrokerError::Transport { .. } => "TRANSPORT_FAILED".to_string(),
                        BrokerError::Http { status, .. } => format!("HTTP_{status}"),
                        BrokerError::ResponseParse { .. } => "RESPONSE_PARSE_FAILED".to_string(),
                        BrokerError::Auth { .. } => "AUTH_FAILED".to_string(),
                        BrokerError::Config { .. } => "CONFIG_FAILED".to_string(),
                    };
                    warn!(rule_id = %intent.rule_id, code = %code, error = %e, "broker call failed");
                    op.fail(code, e.to_string())?;
                }
            }
            Ok(response) => {
                op.response_payload = Some(response.body.clone());

                // Build succeeded, so the operation definition exists.
                let definition = match self.dictionary.operation(&intent.service, &intent.operation)
                {
                    Some(definition) => definition.clone(),
                    None => {
                        op.fail("BUILD_FAILED", "operation definition missing")?;
                        self.store.update(&op).await?;
                        return Ok(op);
                    }
                };

                if !is_success(&response, &definition) {
                    let message = extract_error_message(&response);
                    warn!(rule_id = %intent.rule_id, message = %message, "device rejected operation");
                    op.fail("DEVICE_REJECTED", message)?;
                } else {
                    match self.extract_vendor_ref(&response, &definition) {
                        Ok(vendor_ref) => {
                            info!(
                                rule_id = %intent.rule_id,
                                vendor_ref = vendor_ref.as_deref().unwrap_or("<none>"),
                                "operation completed"
                            );
                            op.complete(vendor_ref)?;
                        }
                        Err(e) => {
                            // Deterministic failure; retrying would not help.
                            warn!(rule_id = %intent.rule_id, error = %e, "response parse failed");
                            op.fail("RESPONSE_PARSE_FAILED", e.to_string())?;
                        }
                    }
                }
            }
        }

        self.store.update(&op).await?;
        Ok(op)
    }

    fn extract_vendor_ref(
        &self,
        response: &vnf_broker::BrokerResponse,
        definition: &vnf_dictionary::OperationDefinition,
    ) -> Result<Option<String>, BrokerError> {
        let Some(mapping) = &definition.response_mapping else {
            return Ok(None);
        };
        if mapping.id_path.is_none() {
            return Ok(None);
        }
        let body = parse_body(response)?;
        Ok(extract_external_id(&body, mapping))
    }
}
