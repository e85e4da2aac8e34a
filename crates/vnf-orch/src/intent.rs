//! Rule intents and content hashing.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use vnf_dictionary::TemplateContext;

use crate::operation::OperationType;

/// A caller-submitted intent to mutate one rule on one appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIntent {
    /// The appliance the rule lives on.
    pub vnf_instance_id: String,
    /// Idempotency and correlation key; generated when the caller has none.
    pub rule_id: String,
    /// Dictionary service (firewall, nat, ...).
    pub service: String,
    /// Dictionary operation name (create, delete, ...).
    pub operation: String,
    /// What the operation does, for state tracking.
    pub operation_type: OperationType,
    /// Template variables describing the rule.
    pub variables: BTreeMap<String, String>,
}

impl RuleIntent {
    /// Creates a create-rule intent, generating a rule id when the caller
    /// supplies none.
    pub fn create(
        vnf_instance_id: impl Into<String>,
        service: impl Into<String>,
        rule_id: Option<String>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            vnf_instance_id: vnf_instance_id.into(),
            rule_id: rule_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            service: service.into(),
            operation: "create".to_string(),
            operation_type: OperationType::Create,
            variables,
        }
    }

    /// Builds the template context for this intent.
    ///
    /// All rule variables are bound, plus `ruleId` so dictionary templates
    /// can reference the orchestrator-side key.
    pub fn context(&self) -> TemplateContext {
        let mut context: TemplateContext = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        context.set("ruleId", self.rule_id.clone());
        context
    }
}

/// Canonical encoding hashed for idempotency, version 1.
///
/// Field order is fixed and the variable map is sorted, so the encoding is
/// stable across processes. The rule id is deliberately excluded: the hash
/// exists to catch logically-identical retries resubmitted under a fresh
/// rule id. Bumping the layout requires bumping the version prefix in
/// [`content_hash`].
#[derive(Serialize)]
struct CanonicalIntent<'a> {
    vnf_instance_id: &'a str,
    operation_type: &'a str,
    service: &'a str,
    operation: &'a str,
    variables: &'a BTreeMap<String, String>,
}

/// Computes the versioned content hash of an intent.
///
/// Two intents hash identically exactly when they describe the same
/// mutation on the same appliance, regardless of rule id.
pub fn content_hash(intent: &RuleIntent) -> String {
    let canonical = CanonicalIntent {
        vnf_instance_id: &intent.vnf_instance_id,
        operation_type: intent.operation_type.as_str(),
        service: &intent.service,
        operation: &intent.operation,
        variables: &intent.variables,
    };
    let encoded =
        serde_json::to_vec(&canonical).expect("canonical intent encoding cannot fail");

    let digest = Sha256::digest(&encoded);
    let mut hash = String::with_capacity(3 + digest.len() * 2);
    hash.push_str("v1:");
    for byte in digest {
        let _ = write!(hash, "{byte:02x}");
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> RuleIntent {
        let mut variables = BTreeMap::new();
        variables.insert("sourceCidr".to_string(), "10.0.0.0/24".to_string());
        variables.insert("startPort".to_string(), "443".to_string());
        RuleIntent::create("appliance-1", "firewall", Some("r-1".to_string()), variables)
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(content_hash(&sample()), content_hash(&sample()));
        assert!(content_hash(&sample()).starts_with("v1:"));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let base = sample();

        let mut other = base.clone();
        other.variables.insert("startPort".to_string(), "8443".to_string());
        assert_ne!(content_hash(&base), content_hash(&other));

        // The rule id does not participate: a retry under a fresh id
        // hashes identically.
        let mut other = base.clone();
        other.rule_id = "r-2".to_string();
        assert_eq!(content_hash(&base), content_hash(&other));

        let mut other = base.clone();
        other.operation_type = OperationType::Delete;
        other.operation = "delete".to_string();
        assert_ne!(content_hash(&base), content_hash(&other));
    }

    #[test]
    fn test_generated_rule_ids_are_unique() {
        let a = RuleIntent::create("appliance-1", "firewall", None, BTreeMap::new());
        let b = RuleIntent::create("appliance-1", "firewall", None, BTreeMap::new());
        assert_ne!(a.rule_id, b.rule_id);
    }

    #[test]
    fn test_context_includes_rule_id() {
        let intent = sample();
        let context = intent.context();
        assert_eq!(context.get("ruleId"), Some("r-1"));
        assert_eq!(context.get("sourceCidr"), Some("10.0.0.0/24"));
    }
}
