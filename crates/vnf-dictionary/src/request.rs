//! Wire request construction.
//!
//! Combines a dictionary, a service/operation pair, and a variable context
//! into the concrete request handed to the broker client.

use serde::Serialize;

use crate::error::RequestBuildError;
use crate::model::VendorDictionary;
use crate::template::{render, TemplateContext};

/// A concrete request ready for the broker client.
///
/// For HTTP operations `endpoint` is a URL path; for SSH/CLI operations it
/// is the rendered device command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireRequest {
    /// HTTP verb, or `SSH`/`CLI`.
    pub method: String,
    /// Rendered endpoint path or command.
    pub endpoint: String,
    /// Rendered request body, if the operation declares one.
    pub body: Option<String>,
    /// Rendered headers in dictionary order.
    pub headers: Vec<(String, String)>,
}

impl WireRequest {
    /// Returns true for SSH/CLI command requests.
    pub fn is_cli(&self) -> bool {
        matches!(self.method.to_ascii_uppercase().as_str(), "SSH" | "CLI")
    }
}

/// Builds [`WireRequest`]s from dictionary operations.
pub struct RequestBuilder;

impl RequestBuilder {
    /// Builds the wire request for one operation.
    ///
    /// Endpoint, body, and each header value are rendered independently
    /// with the same context. The method defaults to GET when the
    /// dictionary leaves it unset.
    pub fn build(
        dictionary: &VendorDictionary,
        service: &str,
        operation: &str,
        context: &TemplateContext,
    ) -> Result<WireRequest, RequestBuildError> {
        let service_def =
            dictionary
                .service(service)
                .ok_or_else(|| RequestBuildError::UnknownService {
                    service: service.to_string(),
                })?;

        let op = service_def.operations.get(operation).ok_or_else(|| {
            RequestBuildError::UnknownOperation {
                service: service.to_string(),
                operation: operation.to_string(),
            }
        })?;

        let endpoint = op
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RequestBuildError::MissingEndpoint {
                service: service.to_string(),
                operation: operation.to_string(),
            })?;

        let method = if op.method.trim().is_empty() {
            "GET".to_string()
        } else {
            op.method.to_ascii_uppercase()
        };

        Ok(WireRequest {
            method,
            endpoint: render(endpoint, context),
            body: op.body.as_deref().map(|b| render(b, context)),
            headers: op
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), render(value, context)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DictionaryParser;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
vendor: acme
product: fw-9000
services:
  firewall:
    create:
      method: post
      endpoint: /rules
      body: '{"src": "${sourceCidr}", "port": ${startPort}}'
      headers:
        X-Trace: ${ruleId}
        X-Mode: static
    delete:
      method: DELETE
      endpoint: /rules/${externalId}
    status:
      endpoint: /rules/${externalId}/status
    broken: {}
"#;

    fn dictionary() -> VendorDictionary {
        DictionaryParser::default().parse(SAMPLE).unwrap()
    }

    #[test]
    fn test_build_renders_all_parts() {
        let mut ctx = TemplateContext::new();
        ctx.set("sourceCidr", "10.1.0.0/16");
        ctx.set("startPort", "443");
        ctx.set("ruleId", "r-17");

        let request = RequestBuilder::build(&dictionary(), "firewall", "create", &ctx).unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.endpoint, "/rules");
        assert_eq!(
            request.body.as_deref(),
            Some(r#"{"src": "10.1.0.0/16", "port": 443}"#)
        );
        assert_eq!(
            request.headers,
            vec![
                ("X-Trace".to_string(), "r-17".to_string()),
                ("X-Mode".to_string(), "static".to_string()),
            ]
        );
        assert!(!request.is_cli());
    }

    #[test]
    fn test_endpoint_variables_rendered() {
        let mut ctx = TemplateContext::new();
        ctx.set("externalId", "fw-abc-123");

        let request = RequestBuilder::build(&dictionary(), "firewall", "delete", &ctx).unwrap();
        assert_eq!(request.endpoint, "/rules/fw-abc-123");
        assert_eq!(request.body, None);
    }

    #[test]
    fn test_method_defaults_to_get() {
        let ctx = TemplateContext::new();
        let request = RequestBuilder::build(&dictionary(), "firewall", "status", &ctx).unwrap();
        assert_eq!(request.method, "GET");
    }

    #[test]
    fn test_unknown_service() {
        let err =
            RequestBuilder::build(&dictionary(), "vpn", "create", &TemplateContext::new())
                .unwrap_err();
        assert_eq!(
            err,
            RequestBuildError::UnknownService {
                service: "vpn".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_operation() {
        let err =
            RequestBuilder::build(&dictionary(), "firewall", "purge", &TemplateContext::new())
                .unwrap_err();
        assert_eq!(
            err,
            RequestBuildError::UnknownOperation {
                service: "firewall".to_string(),
                operation: "purge".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_endpoint() {
        let err =
            RequestBuilder::build(&dictionary(), "firewall", "broken", &TemplateContext::new())
                .unwrap_err();
        assert_eq!(
            err,
            RequestBuildError::MissingEndpoint {
                service: "firewall".to_string(),
                operation: "broken".to_string(),
            }
        );
    }
}
