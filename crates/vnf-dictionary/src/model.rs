//! Typed definition tree for vendor dictionaries.
//!
//! The loosely-typed YAML document is converted into these structures by a
//! single validating pass in [`crate::parser`]; downstream code never touches
//! raw YAML values.

use std::collections::BTreeMap;

/// Authentication scheme declared in a dictionary's access section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// No authentication.
    #[default]
    None,
    /// HTTP basic authentication (username + password references).
    Basic,
    /// Static bearer token (token reference).
    Token,
    /// Short-lived signed JWT minted per call.
    Jwt,
}

impl AuthType {
    /// Parses an auth type string from the dictionary, case-insensitive.
    ///
    /// Unknown values fall back to `None`; validation flags the credential
    /// references separately.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "basic" => AuthType::Basic,
            "token" | "bearer" => AuthType::Token,
            "jwt" => AuthType::Jwt,
            _ => AuthType::None,
        }
    }

    /// Returns the canonical name of this auth type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Basic => "basic",
            AuthType::Token => "token",
            AuthType::Jwt => "jwt",
        }
    }
}

/// Device access configuration from the dictionary's `access` section.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Transport protocol: http, https, ssh, or telnet.
    pub protocol: String,
    /// Device port, 1-65535.
    pub port: u16,
    /// Path prefix prepended to HTTP endpoints.
    pub base_path: String,
    /// Authentication scheme.
    pub auth_type: AuthType,
    /// Reference to the username secret (basic auth).
    pub username_ref: Option<String>,
    /// Reference to the password secret (basic auth).
    pub password_ref: Option<String>,
    /// Reference to the token secret (token/jwt auth).
    pub token_ref: Option<String>,
    /// Header carrying the token, defaults to `Authorization`.
    pub token_header: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            port: 443,
            base_path: String::new(),
            auth_type: AuthType::None,
            username_ref: None,
            password_ref: None,
            token_ref: None,
            token_header: "Authorization".to_string(),
        }
    }
}

/// Mapping from a device response onto orchestrator-visible fields.
#[derive(Debug, Clone)]
pub struct ResponseMapping {
    /// HTTP status code indicating success, defaults to 200.
    pub success_code: u16,
    /// Dot-separated path to the vendor-assigned id in the response body.
    pub id_path: Option<String>,
    /// Dot-separated path to the array of items in a list response.
    pub list_path: Option<String>,
    /// Per-item field name to dot-path mappings for list responses.
    pub item_paths: BTreeMap<String, String>,
}

impl Default for ResponseMapping {
    fn default() -> Self {
        Self {
            success_code: 200,
            id_path: None,
            list_path: None,
            item_paths: BTreeMap::new(),
        }
    }
}

/// One operation a service supports (create, delete, list, ...).
#[derive(Debug, Clone)]
pub struct OperationDefinition {
    /// HTTP verb, or `SSH`/`CLI` for command execution.
    pub method: String,
    /// URL path template for HTTP operations; command template for CLI.
    pub endpoint: Option<String>,
    /// Request body template.
    pub body: Option<String>,
    /// Header name/template pairs in dictionary order.
    pub headers: Vec<(String, String)>,
    /// Response extraction rules.
    pub response_mapping: Option<ResponseMapping>,
    /// Success regex for CLI responses.
    pub success_pattern: Option<String>,
}

impl OperationDefinition {
    /// Returns true for SSH/CLI command operations.
    pub fn is_cli(&self) -> bool {
        matches!(self.method.to_ascii_uppercase().as_str(), "SSH" | "CLI")
    }
}

/// A named group of operations (e.g. `firewall`, `nat`, `loadbalancer`).
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// The service name, as keyed in the dictionary.
    pub name: String,
    /// Operations keyed by name.
    pub operations: BTreeMap<String, OperationDefinition>,
}

/// A parsed vendor dictionary.
///
/// Immutable once parsed; re-uploading a dictionary replaces it wholesale.
#[derive(Debug, Clone)]
pub struct VendorDictionary {
    /// Vendor name (required in strict parsing).
    pub vendor: Option<String>,
    /// Product name (required in strict parsing).
    pub product: Option<String>,
    /// Dictionary schema version, defaults to "1.0".
    pub version: String,
    /// Device access configuration, if declared.
    pub access: Option<AccessConfig>,
    /// Services keyed by name.
    pub services: BTreeMap<String, ServiceDefinition>,
}

impl VendorDictionary {
    /// Looks up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    /// Looks up an operation within a service.
    pub fn operation(&self, service: &str, operation: &str) -> Option<&OperationDefinition> {
        self.services.get(service)?.operations.get(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_parse() {
        assert_eq!(AuthType::parse("basic"), AuthType::Basic);
        assert_eq!(AuthType::parse("BASIC"), AuthType::Basic);
        assert_eq!(AuthType::parse("bearer"), AuthType::Token);
        assert_eq!(AuthType::parse("jwt"), AuthType::Jwt);
        assert_eq!(AuthType::parse("none"), AuthType::None);
        assert_eq!(AuthType::parse("kerberos"), AuthType::None);
    }

    #[test]
    fn test_access_config_defaults() {
        let access = AccessConfig::default();
        assert_eq!(access.protocol, "https");
        assert_eq!(access.port, 443);
        assert_eq!(access.token_header, "Authorization");
        assert_eq!(access.auth_type, AuthType::None);
    }

    #[test]
    fn test_operation_is_cli() {
        let mut op = OperationDefinition {
            method: "POST".to_string(),
            endpoint: None,
            body: None,
            headers: Vec::new(),
            response_mapping: None,
            success_pattern: None,
        };
        assert!(!op.is_cli());

        op.method = "SSH".to_string();
        assert!(op.is_cli());

        op.method = "cli".to_string();
        assert!(op.is_cli());
    }
}
