//! Desired-vs-actual reconciliation.
//!
//! The reconciliation engine fetches the rules actually present on a device
//! through the dictionary's list operation, diffs them against the
//! orchestrator's desired rule set, and optionally repairs the drift it
//! finds. Every run is persisted with counts and an ordered per-rule action
//! list.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use vnf_broker::{is_success, parse_list_response, Broker, DeviceRule};
use vnf_dictionary::{RequestBuilder, TemplateContext, VendorDictionary};

use crate::dispatch::Dispatcher;
use crate::error::{OrchError, OrchResult};
use crate::intent::RuleIntent;
use crate::operation::{OperationState, OperationType};
use crate::store::{OperationStore, ReconciliationStore};

/// One rule the orchestrator wants present on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRule {
    /// The orchestrator-side rule id.
    pub rule_id: String,
    /// Dictionary service the rule belongs to.
    pub service: String,
    /// Template variables describing the rule.
    pub variables: BTreeMap<String, String>,
    /// Vendor-assigned id, when the orchestrator already knows it.
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Supplies the desired rule set for a network.
///
/// The orchestrator is the source of truth; this trait is the seam it
/// plugs into.
#[async_trait]
pub trait DesiredStateProvider: Send + Sync {
    /// Returns the rules that should exist on the network's appliance.
    async fn desired_rules(&self, network_id: &str) -> OrchResult<Vec<DesiredRule>>;
}

/// Fixed desired state, for tests and the standalone daemon.
#[derive(Debug, Clone, Default)]
pub struct StaticDesiredState {
    rules: Vec<DesiredRule>,
}

impl StaticDesiredState {
    /// Creates a provider that always returns `rules`.
    pub fn new(rules: Vec<DesiredRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl DesiredStateProvider for StaticDesiredState {
    async fn desired_rules(&self, _network_id: &str) -> OrchResult<Vec<DesiredRule>> {
        Ok(self.rules.clone())
    }
}

/// What reconciliation did about one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionType {
    /// A missing rule was re-applied to the device.
    Reapplied,
    /// An unexpected rule was removed from the device.
    Removed,
    /// The rule needs manual attention.
    Flagged,
    /// The rule matched; nothing to do.
    NoAction,
}

/// One per-rule entry in a run's action list.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationAction {
    /// Dictionary service the rule belongs to.
    pub service: String,
    /// What was done.
    pub action_type: ActionType,
    /// The rule id (orchestrator-side, or the device external id for
    /// extra rules).
    pub rule_id: String,
    /// Human-readable detail.
    pub description: String,
}

/// Final status of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// The run is still executing.
    Running,
    /// The run finished and every repair succeeded.
    Success,
    /// The list call itself failed; no diff was computed.
    Failed,
    /// The run finished but some repair action failed.
    PartialSuccess,
}

/// A persisted reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationRun {
    /// Unique run id.
    pub id: String,
    /// The reconciled network.
    pub network_id: String,
    /// The appliance serving the network.
    pub appliance_id: String,
    /// When the run started.
    pub started: DateTime<Utc>,
    /// When the run finished.
    pub completed: Option<DateTime<Utc>>,
    /// Final status.
    pub status: RunStatus,
    /// Number of desired rules checked.
    pub rules_checked: u32,
    /// Desired rules absent from the device.
    pub missing_found: u32,
    /// Device rules absent from the desired set.
    pub extra_found: u32,
    /// Missing rules successfully re-applied.
    pub rules_reapplied: u32,
    /// Extra rules successfully removed.
    pub rules_removed: u32,
    /// True when any rule was missing or extra.
    pub drift_detected: bool,
    /// Failure detail when the run failed.
    pub error_message: Option<String>,
    /// Ordered per-rule actions.
    pub actions: Vec<ReconciliationAction>,
}

impl ReconciliationRun {
    fn new(network_id: &str, appliance_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            network_id: network_id.to_string(),
            appliance_id: appliance_id.to_string(),
            started: Utc::now(),
            completed: None,
            status: RunStatus::Running,
            rules_checked: 0,
            missing_found: 0,
            extra_found: 0,
            rules_reapplied: 0,
            rules_removed: 0,
            drift_detected: false,
            error_message: None,
            actions: Vec::new(),
        }
    }

    fn push_action(
        &mut self,
        service: &str,
        action_type: ActionType,
        rule_id: &str,
        description: impl Into<String>,
    ) {
        self.actions.push(ReconciliationAction {
            service: service.to_string(),
            action_type,
            rule_id: rule_id.to_string(),
            description: description.into(),
        });
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed = Some(Utc::now());
    }
}

/// Repair policy for a reconciler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcilePolicy {
    /// Delete device rules the orchestrator does not know about.
    ///
    /// Off by default: extra rules are flagged for manual review.
    pub auto_remove_extra: bool,
}

/// Drives reconciliation for one appliance.
pub struct Reconciler {
    dictionary: Arc<VendorDictionary>,
    broker: Arc<dyn Broker>,
    dispatcher: Arc<Dispatcher>,
    operations: Arc<dyn OperationStore>,
    runs: Arc<dyn ReconciliationStore>,
    desired: Arc<dyn DesiredStateProvider>,
    policy: ReconcilePolicy,
    vnf_instance_id: String,
}

impl Reconciler {
    /// Creates a reconciler for one appliance.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dictionary: Arc<VendorDictionary>,
        broker: Arc<dyn Broker>,
        dispatcher: Arc<Dispatcher>,
        operations: Arc<dyn OperationStore>,
        runs: Arc<dyn ReconciliationStore>,
        desired: Arc<dyn DesiredStateProvider>,
        policy: ReconcilePolicy,
        vnf_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            dictionary,
            broker,
            dispatcher,
            operations,
            runs,
            desired,
            policy,
            vnf_instance_id: vnf_instance_id.into(),
        }
    }

    /// Reconciles one network against its appliance.
    ///
    /// Dry runs detect and report drift but never issue create or delete
    /// calls; the only broker traffic is the list operation.
    #[instrument(skip(self), fields(appliance = %self.vnf_instance_id))]
    pub async fn reconcile(&self, network_id: &str, dry_run: bool) -> OrchResult<ReconciliationRun> {
        let mut run = ReconciliationRun::new(network_id, &self.vnf_instance_id);
        self.runs.insert(run.clone()).await?;

        let desired = self.desired.desired_rules(network_id).await?;
        run.rules_checked = desired.len() as u32;

        let mut by_service: BTreeMap<String, Vec<DesiredRule>> = BTreeMap::new();
        for rule in desired {
            by_service.entry(rule.service.clone()).or_default().push(rule);
        }

        let mut repair_failures = 0u32;

        for (service, rules) in by_service {
            let actual = match self.list_actual(&service, network_id).await {
                Ok(actual) => actual,
                Err(e) => {
                    warn!(service = %service, error = %e, "list call failed, aborting run");
                    run.error_message = Some(e.to_string());
                    run.finish(RunStatus::Failed);
                    self.runs.update(&run).await?;
                    return Ok(run);
                }
            };

            let (missing, extra) = self.diff(&service, &rules, actual, &mut run).await?;

            run.missing_found += missing.len() as u32;
            run.extra_found += extra.len() as u32;

            for rule in missing {
                if dry_run {
                    run.push_action(
                        &service,
                        ActionType::Flagged,
                        &rule.rule_id,
                        "missing on device (dry run)",
                    );
                    continue;
                }
                match self.reapply(&rule).await {
                    Ok(()) => {
                        run.rules_reapplied += 1;
                        run.push_action(
                            &service,
                            ActionType::Reapplied,
                            &rule.rule_id,
                            "missing rule re-applied",
                        );
                    }
                    Err(message) => {
                        repair_failures += 1;
                        run.push_action(
                            &service,
                            ActionType::Flagged,
                            &rule.rule_id,
                            format!("re-apply failed: {message}"),
                        );
                    }
                }
            }

            for device_rule in extra {
                let rule_id = device_rule
                    .external_id
                    .clone()
                    .unwrap_or_else(|| format!("extra-{}", Uuid::new_v4()));

                if dry_run {
                    run.push_action(
                        &service,
                        ActionType::Flagged,
                        &rule_id,
                        "unexpected rule on device (dry run)",
                    );
                    continue;
                }
                if !self.policy.auto_remove_extra {
                    run.push_action(
                        &service,
                        ActionType::Flagged,
                        &rule_id,
                        "unexpected rule on device, manual review required",
                    );
                    continue;
                }
                match self.remove_extra(&service, &rule_id, &device_rule).await {
                    Ok(()) => {
                        run.rules_removed += 1;
                        run.push_action(
                            &service,
                            ActionType::Removed,
                            &rule_id,
                            "unexpected rule removed",
                        );
                    }
                    Err(message) => {
                        repair_failures += 1;
                        run.push_action(
                            &service,
                            ActionType::Flagged,
                            &rule_id,
                            format!("removal failed: {message}"),
                        );
                    }
                }
            }
        }

        run.drift_detected = run.missing_found + run.extra_found > 0;
        run.finish(if repair_failures > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        });
        self.runs.update(&run).await?;

        info!(
            network_id,
            dry_run,
            checked = run.rules_checked,
            missing = run.missing_found,
            extra = run.extra_found,
            reapplied = run.rules_reapplied,
            removed = run.rules_removed,
            drift = run.drift_detected,
            status = ?run.status,
            "reconciliation run finished"
        );

        Ok(run)
    }

    /// Fetches the rules actually present on the device for one service.
    async fn list_actual(&self, service: &str, network_id: &str) -> OrchResult<Vec<DeviceRule>> {
        let mut context = TemplateContext::new();
        context.set("networkId", network_id);

        let request = RequestBuilder::build(&self.dictionary, service, "list", &context)?;
        let operation_name = format!("{service}.list");
        let response = self.broker.execute(&request, &operation_name).await?;

        let definition = self
            .dictionary
            .operation(service, "list")
            .ok_or_else(|| OrchError::Build(vnf_dictionary::RequestBuildError::UnknownOperation {
                service: service.to_string(),
                operation: "list".to_string(),
            }))?;

        if !is_success(&response, definition) {
            return Err(OrchError::Broker(vnf_broker::BrokerError::Http {
                status: response.status,
                body: response.body,
                attempts: 1,
            }));
        }

        Ok(parse_list_response(&response, definition, service)?)
    }

    /// Splits desired rules into (missing, extra) against the actual set,
    /// recording matches as NoAction along the way.
    async fn diff(
        &self,
        service: &str,
        desired: &[DesiredRule],
        actual: Vec<DeviceRule>,
        run: &mut ReconciliationRun,
    ) -> OrchResult<(Vec<DesiredRule>, Vec<DeviceRule>)> {
        let mut unmatched_actual = actual;
        let mut missing = Vec::new();

        for rule in desired {
            let external_id = self.resolve_external_id(rule).await?;

            let position = unmatched_actual
                .iter()
                .position(|device_rule| matches_device_rule(rule, external_id.as_deref(), device_rule));

            match position {
                Some(index) => {
                    unmatched_actual.remove(index);
                    run.push_action(
                        service,
                        ActionType::NoAction,
                        &rule.rule_id,
                        "rule present on device",
                    );
                }
                None => missing.push(rule.clone()),
            }
        }

        Ok((missing, unmatched_actual))
    }

    /// Resolves a desired rule's external id, correlating through the
    /// operation store when the orchestrator does not carry it.
    async fn resolve_external_id(&self, rule: &DesiredRule) -> OrchResult<Option<String>> {
        if rule.external_id.is_some() {
            return Ok(rule.external_id.clone());
        }
        let create_op = self
            .operations
            .find_by_rule_id(&rule.rule_id, OperationType::Create)
            .await?;
        Ok(create_op
            .filter(|op| op.state == OperationState::Completed)
            .and_then(|op| op.vendor_ref))
    }

    /// Re-issues a missing rule's create intent; Err carries the reason.
    async fn reapply(&self, rule: &DesiredRule) -> Result<(), String> {
        let intent = RuleIntent {
            vnf_instance_id: self.vnf_instance_id.clone(),
            rule_id: rule.rule_id.clone(),
            service: rule.service.clone(),
            operation: "create".to_string(),
            operation_type: OperationType::Create,
            variables: rule.variables.clone(),
        };

        match self.dispatcher.reapply_intent(intent).await {
            Ok(op) if op.state == OperationState::Completed => Ok(()),
            Ok(op) => Err(op
                .error_message
                .unwrap_or_else(|| "operation did not complete".to_string())),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Deletes an extra device rule; Err carries the reason.
    async fn remove_extra(
        &self,
        service: &str,
        rule_id: &str,
        device_rule: &DeviceRule,
    ) -> Result<(), String> {
        let mut variables = device_rule.properties.clone();
        if let Some(external_id) = &device_rule.external_id {
            variables.insert("externalId".to_string(), external_id.clone());
        }

        let intent = RuleIntent {
            vnf_instance_id: self.vnf_instance_id.clone(),
            rule_id: rule_id.to_string(),
            service: service.to_string(),
            operation: "delete".to_string(),
            operation_type: OperationType::Delete,
            variables,
        };

        match self.dispatcher.reapply_intent(intent).await {
            Ok(op) if op.state == OperationState::Completed => Ok(()),
            Ok(op) => Err(op
                .error_message
                .unwrap_or_else(|| "operation did not complete".to_string())),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Decides whether a desired rule and a device rule are the same rule.
///
/// External ids win when both sides carry one. Otherwise rules match on
/// their normalized field tuple: every field present on both sides must
/// agree, and at least one field must be shared.
fn matches_device_rule(
    desired: &DesiredRule,
    external_id: Option<&str>,
    device_rule: &DeviceRule,
) -> bool {
    if let (Some(desired_id), Some(device_id)) = (external_id, device_rule.external_id.as_deref())
    {
        return desired_id == device_id;
    }

    let mut shared = 0;
    for (field, value) in &desired.variables {
        if let Some(device_value) = device_rule.properties.get(field) {
            if device_value != value {
                return false;
            }
            shared += 1;
        }
    }
    shared > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(rule_id: &str, fields: &[(&str, &str)]) -> DesiredRule {
        DesiredRule {
            rule_id: rule_id.to_string(),
            service: "firewall".to_string(),
            variables: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            external_id: None,
        }
    }

    fn device(external_id: Option<&str>, fields: &[(&str, &str)]) -> DeviceRule {
        DeviceRule {
            external_id: external_id.map(str::to_string),
            service_name: "firewall".to_string(),
            properties: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_external_id_match_wins() {
        let rule = desired("r-1", &[("sourceCidr", "10.0.0.0/24")]);
        let matching = device(Some("fw-1"), &[("sourceCidr", "totally-different")]);
        let other = device(Some("fw-2"), &[("sourceCidr", "10.0.0.0/24")]);

        assert!(matches_device_rule(&rule, Some("fw-1"), &matching));
        assert!(!matches_device_rule(&rule, Some("fw-1"), &other));
    }

    #[test]
    fn test_field_tuple_match() {
        let rule = desired("r-1", &[("sourceCidr", "10.0.0.0/24"), ("action", "allow")]);

        // All shared fields agree.
        let matching = device(None, &[("sourceCidr", "10.0.0.0/24"), ("action", "allow")]);
        assert!(matches_device_rule(&rule, None, &matching));

        // One shared field disagrees.
        let conflicting = device(None, &[("sourceCidr", "10.0.0.0/24"), ("action", "deny")]);
        assert!(!matches_device_rule(&rule, None, &conflicting));

        // No shared fields at all.
        let unrelated = device(None, &[("publicIp", "203.0.113.1")]);
        assert!(!matches_device_rule(&rule, None, &unrelated));
    }

    #[test]
    fn test_one_sided_external_id_falls_back_to_fields() {
        let rule = desired("r-1", &[("sourceCidr", "10.0.0.0/24")]);
        let device_rule = device(None, &[("sourceCidr", "10.0.0.0/24")]);
        assert!(matches_device_rule(&rule, Some("fw-1"), &device_rule));
    }
}
