//! Device response interpretation.
//!
//! Responses are interpreted through the dictionary's response mapping:
//! success detection, external id extraction, and list parsing all walk
//! dot-separated paths over the parsed JSON body. Only a top-level body
//! parse failure on an otherwise successful response is an error; any
//! deeper miss degrades to `None`/omitted.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use vnf_dictionary::{OperationDefinition, ResponseMapping};

use crate::client::BrokerResponse;
use crate::error::{BrokerError, BrokerResult};

/// One actual rule present on a device, parsed from a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRule {
    /// Vendor-assigned id, when the item mapping exposes one.
    pub external_id: Option<String>,
    /// The service this rule belongs to.
    pub service_name: String,
    /// Item fields resolved through the per-item path mappings.
    pub properties: BTreeMap<String, String>,
}

/// Item-path key conventionally holding the vendor-assigned id.
const EXTERNAL_ID_FIELD: &str = "externalId";

/// Decides whether a response indicates success for an operation.
///
/// HTTP operations compare the status against the mapping's success code
/// (any 2xx when no mapping is declared). CLI operations match the
/// operation's success pattern against the body, and count as successful
/// when no pattern is declared.
pub fn is_success(response: &BrokerResponse, operation: &OperationDefinition) -> bool {
    if operation.is_cli() {
        return match operation.success_pattern.as_deref() {
            Some(pattern) => match Regex::new(pattern) {
                Ok(re) => re.is_match(&response.body),
                Err(e) => {
                    warn!(pattern, error = %e, "invalid success pattern, treating as no match");
                    false
                }
            },
            None => response.is_2xx(),
        };
    }

    match &operation.response_mapping {
        Some(mapping) => response.status == mapping.success_code,
        None => response.is_2xx(),
    }
}

/// Parses the response body as JSON.
///
/// This is the only interpretation step that can fail; callers invoke it
/// when the dictionary promises structure in the body (an id path or a
/// list path).
pub fn parse_body(response: &BrokerResponse) -> BrokerResult<Value> {
    serde_json::from_str(&response.body)
        .map_err(|e| BrokerError::response_parse(format!("body is not valid JSON: {e}")))
}

/// Walks a dot-separated path over a JSON value.
///
/// Returns `None` on any missing segment instead of failing.
fn walk_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Renders a JSON leaf as its string form; objects and arrays have no
/// scalar form and yield `None`.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extracts the vendor-assigned external id from a parsed response body.
pub fn extract_external_id(body: &Value, mapping: &ResponseMapping) -> Option<String> {
    let path = mapping.id_path.as_deref()?;
    walk_path(body, path).and_then(value_to_string)
}

/// Best-effort error message extraction.
///
/// Looks for the conventional `error` then `message` fields in a JSON
/// body; falls back to the status line.
pub fn extract_error_message(response: &BrokerResponse) -> String {
    if let Ok(body) = serde_json::from_str::<Value>(&response.body) {
        for field in ["error", "message"] {
            if let Some(message) = body.get(field).and_then(value_to_string) {
                return message;
            }
        }
    }
    format!("status {}", response.status)
}

/// Parses a list response into the rules actually present on the device.
///
/// Walks the mapping's list path to an array, then resolves each item's
/// fields through the per-item paths. A missing list path or a non-array
/// node yields an empty list; individual field misses are omitted from the
/// item's properties.
pub fn parse_list_response(
    response: &BrokerResponse,
    operation: &OperationDefinition,
    service_name: &str,
) -> BrokerResult<Vec<DeviceRule>> {
    let Some(mapping) = &operation.response_mapping else {
        return Ok(Vec::new());
    };
    let Some(list_path) = mapping.list_path.as_deref() else {
        return Ok(Vec::new());
    };

    let body = parse_body(response)?;

    let items = match walk_path(&body, list_path) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!(list_path, "list path does not resolve to an array");
            return Ok(Vec::new());
        }
        None => return Ok(Vec::new()),
    };

    let rules = items
        .iter()
        .map(|item| {
            let mut properties = BTreeMap::new();
            for (field, path) in &mapping.item_paths {
                if let Some(value) = walk_path(item, path).and_then(value_to_string) {
                    properties.insert(field.clone(), value);
                }
            }
            let external_id = properties.get(EXTERNAL_ID_FIELD).cloned();
            DeviceRule {
                external_id,
                service_name: service_name.to_string(),
                properties,
            }
        })
        .collect();

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vnf_dictionary::DictionaryParser;

    fn response(status: u16, body: &str) -> BrokerResponse {
        BrokerResponse {
            status,
            body: body.to_string(),
            latency_ms: 5,
            correlation_id: "corr-1".to_string(),
        }
    }

    fn operation(yaml: &str, service: &str, op: &str) -> OperationDefinition {
        DictionaryParser::default()
            .parse(yaml)
            .unwrap()
            .operation(service, op)
            .unwrap()
            .clone()
    }

    const DICT: &str = r#"
services:
  firewall:
    create:
      method: POST
      endpoint: /rules
      responseMapping:
        successCode: 201
        idPath: data.rule.id
    list:
      method: GET
      endpoint: /rules
      responseMapping:
        listPath: data.rules
        item:
          externalId: id
          sourceCidr: match.src
          action: verdict
  nat:
    create:
      method: SSH
      endpoint: set nat rule
      successPattern: "applied|OK"
    flush:
      method: SSH
      endpoint: flush nat
"#;

    #[test]
    fn test_is_success_http_uses_mapping_code() {
        let op = operation(DICT, "firewall", "create");
        assert!(is_success(&response(201, "{}"), &op));
        assert!(!is_success(&response(200, "{}"), &op));
        assert!(!is_success(&response(500, "{}"), &op));
    }

    #[test]
    fn test_is_success_defaults_to_2xx_without_mapping() {
        let yaml = "services:\n  firewall:\n    ping:\n      method: GET\n      endpoint: /ping\n";
        let op = operation(yaml, "firewall", "ping");
        assert!(is_success(&response(200, ""), &op));
        assert!(is_success(&response(204, ""), &op));
        assert!(!is_success(&response(404, ""), &op));
    }

    #[test]
    fn test_is_success_cli_matches_pattern() {
        let op = operation(DICT, "nat", "create");
        assert!(is_success(&response(200, "rule applied"), &op));
        assert!(is_success(&response(200, "OK"), &op));
        assert!(!is_success(&response(200, "syntax error"), &op));
    }

    #[test]
    fn test_is_success_cli_without_pattern() {
        let op = operation(DICT, "nat", "flush");
        assert!(is_success(&response(200, "anything"), &op));
        assert!(!is_success(&response(502, "anything"), &op));
    }

    #[test]
    fn test_extract_external_id() {
        let op = operation(DICT, "firewall", "create");
        let mapping = op.response_mapping.as_ref().unwrap();

        let body: Value =
            serde_json::from_str(r#"{"data": {"rule": {"id": "fw-991"}}}"#).unwrap();
        assert_eq!(extract_external_id(&body, mapping), Some("fw-991".to_string()));

        // Numeric ids are stringified.
        let body: Value = serde_json::from_str(r#"{"data": {"rule": {"id": 991}}}"#).unwrap();
        assert_eq!(extract_external_id(&body, mapping), Some("991".to_string()));

        // Any missing segment degrades to None.
        let body: Value = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert_eq!(extract_external_id(&body, mapping), None);
    }

    #[test]
    fn test_parse_body_failure() {
        let err = parse_body(&response(200, "<html>oops</html>")).unwrap_err();
        assert!(matches!(err, BrokerError::ResponseParse { .. }));
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(&response(400, r#"{"error": "bad cidr"}"#)),
            "bad cidr"
        );
        assert_eq!(
            extract_error_message(&response(400, r#"{"message": "nope"}"#)),
            "nope"
        );
        assert_eq!(extract_error_message(&response(502, "not json")), "status 502");
    }

    #[test]
    fn test_parse_list_response() {
        let op = operation(DICT, "firewall", "list");
        let body = r#"{
            "data": {
                "rules": [
                    {"id": "fw-1", "match": {"src": "10.0.0.0/24"}, "verdict": "allow"},
                    {"id": "fw-2", "match": {}, "verdict": "deny"}
                ]
            }
        }"#;

        let rules = parse_list_response(&response(200, body), &op, "firewall").unwrap();
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].external_id.as_deref(), Some("fw-1"));
        assert_eq!(rules[0].service_name, "firewall");
        assert_eq!(
            rules[0].properties.get("sourceCidr").map(String::as_str),
            Some("10.0.0.0/24")
        );
        assert_eq!(
            rules[0].properties.get("action").map(String::as_str),
            Some("allow")
        );

        // Deep miss omits the field instead of failing.
        assert_eq!(rules[1].properties.get("sourceCidr"), None);
        assert_eq!(rules[1].external_id.as_deref(), Some("fw-2"));
    }

    #[test]
    fn test_parse_list_missing_path_is_empty() {
        let op = operation(DICT, "firewall", "list");
        let rules =
            parse_list_response(&response(200, r#"{"data": {}}"#), &op, "firewall").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_parse_list_invalid_body_is_error() {
        let op = operation(DICT, "firewall", "list");
        let err = parse_list_response(&response(200, "not json"), &op, "firewall").unwrap_err();
        assert!(matches!(err, BrokerError::ResponseParse { .. }));
    }

    #[test]
    fn test_parse_list_without_mapping_is_empty() {
        let yaml = "services:\n  firewall:\n    list:\n      method: GET\n      endpoint: /rules\n";
        let op = operation(yaml, "firewall", "list");
        let rules = parse_list_response(&response(200, "[]"), &op, "firewall").unwrap();
        assert!(rules.is_empty());
    }
}
