//! Vendor dictionary support for VNF devices.
//!
//! A dictionary is a declarative YAML description of a vendor device's API.
//! It maps abstract services (firewall, NAT, load balancer) and operations
//! (create, delete, list) onto concrete wire requests, so that one
//! orchestrator can drive appliances from different vendors without
//! vendor-specific code.
//!
//! This crate provides:
//!
//! - [`model`]: the typed definition tree ([`VendorDictionary`],
//!   [`ServiceDefinition`], [`OperationDefinition`], [`ResponseMapping`])
//! - [`parser`]: YAML parsing into the typed tree ([`DictionaryParser`])
//! - [`validate`]: structural validation with errors and warnings
//! - [`template`]: `${name}` placeholder rendering ([`TemplateContext`])
//! - [`request`]: wire request construction ([`RequestBuilder`])
//!
//! # Example
//!
//! ```
//! use vnf_dictionary::{DictionaryParser, RequestBuilder, TemplateContext};
//!
//! let yaml = r#"
//! vendor: acme
//! product: fw-9000
//! services:
//!   firewall:
//!     create:
//!       method: POST
//!       endpoint: /api/rules
//!       body: '{"src": "${sourceCidr}"}'
//! "#;
//!
//! let dictionary = DictionaryParser::default().parse(yaml).unwrap();
//! let mut context = TemplateContext::new();
//! context.set("sourceCidr", "10.0.0.0/24");
//!
//! let request = RequestBuilder::build(&dictionary, "firewall", "create", &context).unwrap();
//! assert_eq!(request.method, "POST");
//! assert_eq!(request.body.as_deref(), Some(r#"{"src": "10.0.0.0/24"}"#));
//! ```

pub mod error;
pub mod model;
pub mod parser;
pub mod request;
pub mod template;
pub mod validate;

pub use error::{DictionaryParseError, RequestBuildError};
pub use model::{
    AccessConfig, AuthType, OperationDefinition, ResponseMapping, ServiceDefinition,
    VendorDictionary,
};
pub use parser::DictionaryParser;
pub use request::{RequestBuilder, WireRequest};
pub use template::{has_unresolved_placeholders, render, render_strict, TemplateContext};
pub use validate::{validate, ValidationResult};
