//! Dictionary registry.
//!
//! Dictionaries are stored keyed by template or by network and replaced
//! wholesale on re-upload. A lookup for a network prefers the
//! network-scoped dictionary and falls back to the template-scoped one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use vnf_dictionary::{validate, DictionaryParser, VendorDictionary};

use crate::error::{OrchError, OrchResult};

/// What a stored dictionary is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictionaryScope {
    /// Applies to every appliance deployed from this template.
    Template(String),
    /// Overrides the template dictionary for one network.
    Network(String),
}

/// In-process dictionary storage.
#[derive(Debug, Default)]
pub struct DictionaryRegistry {
    parser: DictionaryParser,
    dictionaries: RwLock<HashMap<DictionaryScope, Arc<VendorDictionary>>>,
}

impl DictionaryRegistry {
    /// Creates an empty registry with the default parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with a custom parser (e.g. size limits).
    pub fn with_parser(parser: DictionaryParser) -> Self {
        Self {
            parser,
            dictionaries: RwLock::new(HashMap::new()),
        }
    }

    /// Parses, validates, and stores a dictionary.
    ///
    /// Hard validation errors reject the upload outright; warnings are
    /// logged and do not block. A dictionary already stored under the
    /// scope is replaced wholesale.
    pub async fn upload(
        &self,
        scope: DictionaryScope,
        yaml: &str,
    ) -> OrchResult<Arc<VendorDictionary>> {
        let dictionary = self.parser.parse(yaml)?;

        let result = validate(&dictionary);
        for warning in result.warnings() {
            warn!(?scope, warning = %warning, "dictionary warning");
        }
        if !result.is_valid() {
            return Err(OrchError::InvalidDictionary {
                errors: result.errors().to_vec(),
            });
        }

        let dictionary = Arc::new(dictionary);
        self.dictionaries
            .write()
            .await
            .insert(scope.clone(), dictionary.clone());
        info!(
            ?scope,
            vendor = dictionary.vendor.as_deref().unwrap_or("<unset>"),
            services = dictionary.services.len(),
            "dictionary stored"
        );
        Ok(dictionary)
    }

    /// Resolves the dictionary for a network, preferring the
    /// network-scoped entry over the template-scoped one.
    pub async fn lookup(
        &self,
        network_id: Option<&str>,
        template_id: Option<&str>,
    ) -> Option<Arc<VendorDictionary>> {
        let dictionaries = self.dictionaries.read().await;

        if let Some(network_id) = network_id {
            let scope = DictionaryScope::Network(network_id.to_string());
            if let Some(dictionary) = dictionaries.get(&scope) {
                return Some(dictionary.clone());
            }
        }

        if let Some(template_id) = template_id {
            let scope = DictionaryScope::Template(template_id.to_string());
            if let Some(dictionary) = dictionaries.get(&scope) {
                return Some(dictionary.clone());
            }
        }

        None
    }

    /// Removes the dictionary stored under a scope.
    pub async fn remove(&self, scope: &DictionaryScope) -> bool {
        self.dictionaries.write().await.remove(scope).is_some()
    }

    /// Returns the scopes with stored dictionaries.
    pub async fn list(&self) -> Vec<DictionaryScope> {
        self.dictionaries.read().await.keys().cloned().collect()
    }
}
