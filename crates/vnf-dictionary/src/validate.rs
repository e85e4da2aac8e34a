//! Structural validation of parsed dictionaries.
//!
//! Validation distinguishes hard errors (the dictionary cannot be used) from
//! warnings (probable authoring mistakes that do not block use). It never
//! mutates the dictionary.

use std::collections::BTreeSet;

use crate::model::{AccessConfig, AuthType, OperationDefinition, VendorDictionary};
use crate::template::placeholder_names;

/// Transport protocols a dictionary may declare.
const KNOWN_PROTOCOLS: &[&str] = &["http", "https", "ssh", "telnet"];

/// HTTP verbs that do not draw an "unusual method" warning.
const COMMON_HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Placeholder names the orchestrator knows how to bind.
///
/// Unknown names are warnings, never errors: dictionaries may intentionally
/// carry custom fields the caller binds itself.
const KNOWN_PLACEHOLDERS: &[&str] = &[
    // Common
    "ruleId",
    "externalId",
    "networkId",
    // Firewall
    "sourceCidr",
    "destCidr",
    "protocol",
    "startPort",
    "endPort",
    "icmpType",
    "icmpCode",
    "action",
    // NAT / port forwarding
    "sourceIp",
    "publicIp",
    "destIp",
    "privateIp",
    "publicPort",
    "privatePort",
    // Load balancer
    "lbName",
    "algorithm",
    "vipId",
    "memberIp",
    "memberPort",
    // VPN
    "remoteSubnet",
    "localSubnet",
    "sharedSecret",
    "ikePolicy",
    "ipsecPolicy",
    // Secret references
    "username",
    "password",
    "apiKey",
    "token",
];

/// Outcome of validating a dictionary.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
    services_found: Vec<String>,
}

impl ValidationResult {
    /// Returns true when no hard errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hard errors that block use of the dictionary.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Non-blocking authoring warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Names of the services the dictionary defines.
    pub fn services_found(&self) -> &[String] {
        &self.services_found
    }

    fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    fn add_service(&mut self, service: impl Into<String>) {
        self.services_found.push(service.into());
    }
}

/// Validates a parsed dictionary.
pub fn validate(dictionary: &VendorDictionary) -> ValidationResult {
    let mut result = ValidationResult::default();

    if dictionary.version != "1.0" {
        result.add_warning(format!(
            "Schema version {} may not be fully supported",
            dictionary.version
        ));
    }

    match &dictionary.access {
        Some(access) => validate_access(access, &mut result),
        None => result.add_error("Missing access configuration"),
    }

    if dictionary.services.is_empty() {
        result.add_error("No services defined");
    }

    for (name, service) in &dictionary.services {
        result.add_service(name.clone());

        if service.operations.is_empty() {
            result.add_warning(format!("Service '{name}' has no operations defined"));
            continue;
        }

        let has_create = service.operations.contains_key("create");
        let has_delete = service.operations.contains_key("delete");
        if has_create && !has_delete {
            result.add_warning(format!(
                "Service '{name}' has 'create' but no 'delete' operation"
            ));
        }

        for (op_name, op) in &service.operations {
            validate_operation(name, op_name, op, &mut result);
        }
    }

    result
}

fn validate_access(access: &AccessConfig, result: &mut ValidationResult) {
    let protocol = access.protocol.to_ascii_lowercase();
    if !KNOWN_PROTOCOLS.contains(&protocol.as_str()) {
        result.add_error(format!("Unknown protocol: {protocol}"));
    }

    if access.port == 0 {
        result.add_error(format!("Invalid port number: {}", access.port));
    }

    match access.auth_type {
        AuthType::Basic => {
            if access.username_ref.is_none() || access.password_ref.is_none() {
                result.add_warning(
                    "basic auth configured but missing username/password references",
                );
            }
        }
        AuthType::Token | AuthType::Jwt => {
            if access.token_ref.is_none() {
                result.add_warning(format!(
                    "{} auth configured but missing token reference",
                    access.auth_type.as_str()
                ));
            }
        }
        AuthType::None => {}
    }
}

fn validate_operation(
    service: &str,
    op_name: &str,
    op: &OperationDefinition,
    result: &mut ValidationResult,
) {
    if op.method.trim().is_empty() {
        result.add_error(format!(
            "Service '{service}', operation '{op_name}': missing method"
        ));
        return;
    }

    let method = op.method.to_ascii_uppercase();
    let has_endpoint = op.endpoint.as_deref().is_some_and(|e| !e.is_empty());

    if op.is_cli() {
        if !has_endpoint {
            result.add_error(format!(
                "Service '{service}', operation '{op_name}': missing command for SSH/CLI operation"
            ));
        }
    } else {
        if !has_endpoint {
            result.add_error(format!(
                "Service '{service}', operation '{op_name}': missing endpoint"
            ));
        }

        if !COMMON_HTTP_METHODS.contains(&method.as_str()) {
            result.add_warning(format!(
                "Service '{service}', operation '{op_name}': unusual HTTP method '{method}'"
            ));
        }

        let has_body = op.body.as_deref().is_some_and(|b| !b.is_empty());
        if (method == "POST" || method == "PUT") && !has_body {
            result.add_warning(format!(
                "Service '{service}', operation '{op_name}': {method} operation without body"
            ));
        }
    }

    for placeholder in extract_placeholders(op) {
        if !KNOWN_PLACEHOLDERS.contains(&placeholder.as_str()) {
            result.add_warning(format!(
                "Service '{service}', operation '{op_name}': unknown placeholder '${{{placeholder}}}'"
            ));
        }
    }
}

fn extract_placeholders(op: &OperationDefinition) -> BTreeSet<String> {
    let mut placeholders = BTreeSet::new();
    if let Some(endpoint) = &op.endpoint {
        placeholders.extend(placeholder_names(endpoint));
    }
    if let Some(body) = &op.body {
        placeholders.extend(placeholder_names(body));
    }
    for (_, value) in &op.headers {
        placeholders.extend(placeholder_names(value));
    }
    placeholders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DictionaryParser;

    fn parse(yaml: &str) -> VendorDictionary {
        DictionaryParser::default().parse(yaml).unwrap()
    }

    const VALID: &str = r#"
vendor: acme
product: fw-9000
access:
  protocol: https
  port: 443
services:
  firewall:
    create:
      method: POST
      endpoint: /rules
      body: '{"src": "${sourceCidr}"}'
    delete:
      method: DELETE
      endpoint: /rules/${externalId}
"#;

    #[test]
    fn test_valid_dictionary_passes() {
        let result = validate(&parse(VALID));
        assert!(result.is_valid(), "errors: {:?}", result.errors());
        assert!(result.warnings().is_empty(), "warnings: {:?}", result.warnings());
        assert_eq!(result.services_found(), ["firewall"]);
    }

    #[test]
    fn test_missing_access_is_error() {
        let yaml = "services:\n  firewall:\n    list:\n      method: GET\n      endpoint: /r\n";
        let result = validate(&parse(yaml));
        assert!(!result.is_valid());
        assert!(result.errors().iter().any(|e| e.contains("access")));
    }

    #[test]
    fn test_unknown_protocol_is_error() {
        let yaml = "access:\n  protocol: gopher\nservices:\n  firewall:\n    list:\n      method: GET\n      endpoint: /r\n";
        let result = validate(&parse(yaml));
        assert!(result
            .errors()
            .iter()
            .any(|e| e.contains("Unknown protocol: gopher")));
    }

    #[test]
    fn test_port_zero_is_error() {
        let yaml = "access:\n  protocol: https\n  port: 0\nservices:\n  firewall:\n    list:\n      method: GET\n      endpoint: /r\n";
        let result = validate(&parse(yaml));
        assert!(result.errors().iter().any(|e| e.contains("Invalid port")));
    }

    #[test]
    fn test_basic_auth_without_refs_warns() {
        let yaml = "access:\n  protocol: https\n  authType: basic\nservices:\n  firewall:\n    list:\n      method: GET\n      endpoint: /r\n";
        let result = validate(&parse(yaml));
        assert!(result.is_valid());
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("username/password references")));
    }

    #[test]
    fn test_create_without_delete_warns_once() {
        let yaml = r#"
access:
  protocol: https
services:
  firewall:
    create:
      method: POST
      endpoint: /rules
      body: '{"src": "${sourceCidr}"}'
"#;
        let result = validate(&parse(yaml));
        let matching: Vec<_> = result
            .warnings()
            .iter()
            .filter(|w| w.contains("'create' but no 'delete'"))
            .collect();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].contains("'firewall'"));
    }

    #[test]
    fn test_service_without_operations_warns() {
        let yaml = "access:\n  protocol: https\nservices:\n  firewall: {}\n";
        let result = validate(&parse(yaml));
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("no operations defined")));
    }

    #[test]
    fn test_http_operation_without_endpoint_is_error() {
        let yaml = "access:\n  protocol: https\nservices:\n  firewall:\n    list:\n      method: GET\n";
        let result = validate(&parse(yaml));
        assert!(result.errors().iter().any(|e| e.contains("missing endpoint")));
    }

    #[test]
    fn test_cli_operation_without_command_is_error() {
        let yaml = "access:\n  protocol: ssh\nservices:\n  nat:\n    create:\n      method: SSH\n";
        let result = validate(&parse(yaml));
        assert!(result
            .errors()
            .iter()
            .any(|e| e.contains("missing command for SSH/CLI")));
    }

    #[test]
    fn test_unusual_method_and_missing_body_warn() {
        let yaml = r#"
access:
  protocol: https
services:
  firewall:
    create:
      method: POST
      endpoint: /rules
    delete:
      method: PURGE
      endpoint: /rules/${externalId}
"#;
        let result = validate(&parse(yaml));
        assert!(result.is_valid());
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("unusual HTTP method 'PURGE'")));
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("POST operation without body")));
    }

    #[test]
    fn test_unknown_placeholder_warns_not_errors() {
        let yaml = r#"
access:
  protocol: https
services:
  firewall:
    create:
      method: POST
      endpoint: /rules/${customVendorField}
      body: '{"src": "${sourceCidr}"}'
    delete:
      method: DELETE
      endpoint: /rules/${externalId}
"#;
        let result = validate(&parse(yaml));
        assert!(result.is_valid());
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("unknown placeholder '${customVendorField}'")));
    }

    #[test]
    fn test_schema_version_warning() {
        let yaml = "version: \"2.3\"\naccess:\n  protocol: https\nservices:\n  firewall:\n    list:\n      method: GET\n      endpoint: /r\n";
        let result = validate(&parse(yaml));
        assert!(result
            .warnings()
            .iter()
            .any(|w| w.contains("Schema version 2.3")));
    }
}
