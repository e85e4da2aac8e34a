//! YAML dictionary parsing.
//!
//! One validating pass turns the loosely-typed YAML document into the typed
//! definition tree. Shape mismatches surface here as parse errors instead of
//! failing later inside request construction.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::DictionaryParseError;
use crate::model::{
    AccessConfig, AuthType, OperationDefinition, ResponseMapping, ServiceDefinition,
    VendorDictionary,
};

/// Default cap on dictionary size, large enough for any realistic device API.
pub const DEFAULT_MAX_DICTIONARY_BYTES: usize = 512 * 1024;

/// Parser for vendor dictionary YAML.
#[derive(Debug, Clone)]
pub struct DictionaryParser {
    /// Maximum accepted content size in bytes.
    pub max_bytes: usize,
}

impl Default for DictionaryParser {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_DICTIONARY_BYTES,
        }
    }
}

impl DictionaryParser {
    /// Creates a parser with a custom size limit.
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Parses dictionary YAML into the typed tree.
    ///
    /// Fails on empty content, oversized content, malformed YAML, a
    /// non-mapping root, or a missing `services` section.
    pub fn parse(&self, yaml: &str) -> Result<VendorDictionary, DictionaryParseError> {
        self.parse_inner(yaml, false)
    }

    /// Like [`parse`](Self::parse), but additionally requires the `vendor`
    /// and `product` keys.
    pub fn parse_strict(&self, yaml: &str) -> Result<VendorDictionary, DictionaryParseError> {
        self.parse_inner(yaml, true)
    }

    fn parse_inner(
        &self,
        yaml: &str,
        strict: bool,
    ) -> Result<VendorDictionary, DictionaryParseError> {
        if yaml.trim().is_empty() {
            return Err(DictionaryParseError::Empty);
        }
        if yaml.len() > self.max_bytes {
            return Err(DictionaryParseError::TooLarge {
                size: yaml.len(),
                max: self.max_bytes,
            });
        }

        let root: Value = serde_yaml::from_str(yaml)?;
        let root = root.as_mapping().ok_or(DictionaryParseError::InvalidRoot)?;

        let vendor = str_value(root, "vendor");
        let product = str_value(root, "product");
        if strict {
            if vendor.is_none() {
                return Err(DictionaryParseError::missing_section("vendor"));
            }
            if product.is_none() {
                return Err(DictionaryParseError::missing_section("product"));
            }
        }

        let version = str_value(root, "version").unwrap_or_else(|| "1.0".to_string());

        let access = root
            .get(Value::from("access"))
            .and_then(Value::as_mapping)
            .map(parse_access);

        let services_value = root
            .get(Value::from("services"))
            .ok_or_else(|| DictionaryParseError::missing_section("services"))?;
        let services = services_value
            .as_mapping()
            .map(parse_services)
            .unwrap_or_default();

        debug!(
            vendor = vendor.as_deref().unwrap_or("<unset>"),
            services = services.len(),
            "parsed vendor dictionary"
        );

        Ok(VendorDictionary {
            vendor,
            product,
            version,
            access,
            services,
        })
    }
}

fn parse_access(map: &Mapping) -> AccessConfig {
    let defaults = AccessConfig::default();
    AccessConfig {
        protocol: str_value(map, "protocol").unwrap_or(defaults.protocol),
        port: u16_value(map, "port").unwrap_or(defaults.port),
        base_path: str_value(map, "basePath").unwrap_or(defaults.base_path),
        auth_type: str_value(map, "authType")
            .map(|s| AuthType::parse(&s))
            .unwrap_or_default(),
        username_ref: str_value(map, "usernameRef"),
        password_ref: str_value(map, "passwordRef"),
        token_ref: str_value(map, "tokenRef"),
        token_header: str_value(map, "tokenHeader").unwrap_or(defaults.token_header),
    }
}

fn parse_services(map: &Mapping) -> BTreeMap<String, ServiceDefinition> {
    let mut services = BTreeMap::new();
    for (key, value) in map {
        let Some(name) = key.as_str() else { continue };
        let operations = value
            .as_mapping()
            .map(parse_operations)
            .unwrap_or_default();
        services.insert(
            name.to_string(),
            ServiceDefinition {
                name: name.to_string(),
                operations,
            },
        );
    }
    services
}

fn parse_operations(map: &Mapping) -> BTreeMap<String, OperationDefinition> {
    let mut operations = BTreeMap::new();
    for (key, value) in map {
        let Some(name) = key.as_str() else { continue };
        let Some(op_map) = value.as_mapping() else {
            continue;
        };
        operations.insert(name.to_string(), parse_operation(op_map));
    }
    operations
}

fn parse_operation(map: &Mapping) -> OperationDefinition {
    // Header order in the dictionary is preserved on the wire.
    let headers = map
        .get(Value::from("headers"))
        .and_then(Value::as_mapping)
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), scalar_to_string(v)?)))
                .collect()
        })
        .unwrap_or_default();

    let response_mapping = map
        .get(Value::from("responseMapping"))
        .and_then(Value::as_mapping)
        .map(parse_response_mapping);

    OperationDefinition {
        method: str_value(map, "method").unwrap_or_else(|| "GET".to_string()),
        endpoint: str_value(map, "endpoint"),
        body: str_value(map, "body"),
        headers,
        response_mapping,
        success_pattern: str_value(map, "successPattern"),
    }
}

fn parse_response_mapping(map: &Mapping) -> ResponseMapping {
    let item_paths = map
        .get(Value::from("item"))
        .and_then(Value::as_mapping)
        .map(|items| {
            items
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), scalar_to_string(v)?)))
                .collect()
        })
        .unwrap_or_default();

    ResponseMapping {
        success_code: u16_value(map, "successCode").unwrap_or(200),
        id_path: str_value(map, "idPath"),
        list_path: str_value(map, "listPath"),
        item_paths,
    }
}

fn str_value(map: &Mapping, key: &str) -> Option<String> {
    map.get(Value::from(key)).and_then(scalar_to_string)
}

fn u16_value(map: &Mapping, key: &str) -> Option<u16> {
    match map.get(Value::from(key))? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Renders a YAML scalar as its string form; mappings and sequences are not
/// valid where scalars are expected and yield `None`.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
