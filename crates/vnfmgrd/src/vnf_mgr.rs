//! VnfMgr - daemon-side composition of the adapter stack.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use vnf_broker::{AuthCredentials, BrokerClient, BrokerConfig, ConnectivityResult, MemoryAuditSink};
use vnf_dictionary::{validate, DictionaryParser, VendorDictionary};
use vnf_orch::{
    DesiredRule, Dispatcher, MemoryOperationStore, MemoryReconciliationStore, ReconcilePolicy,
    ReconciliationRun, Reconciler, StaticDesiredState,
};

/// Daemon configuration, typically built from command line flags.
#[derive(Debug, Clone)]
pub struct VnfMgrConfig {
    /// Path to the vendor dictionary YAML.
    pub dictionary_path: PathBuf,
    /// Path to the desired rules JSON file, if any.
    pub rules_path: Option<PathBuf>,
    /// Broker base URL.
    pub broker_url: String,
    /// Static bearer token for broker auth, if any.
    pub auth_token: Option<String>,
    /// Network to reconcile.
    pub network_id: String,
    /// Appliance identifier for operations and audit records.
    pub appliance_id: String,
    /// Detect drift without repairing it.
    pub dry_run: bool,
    /// Delete device rules the orchestrator does not know about.
    pub auto_remove: bool,
    /// Maximum broker retries per call.
    pub max_retries: u32,
    /// Broker connect/read timeout.
    pub timeout: Duration,
}

/// The daemon's reconciliation manager.
///
/// Owns the parsed dictionary, the broker client, and the in-memory
/// stores, and drives one network's reconciliation loop.
pub struct VnfMgr {
    config: VnfMgrConfig,
    broker: Arc<BrokerClient>,
    reconciler: Reconciler,
    audit: Arc<MemoryAuditSink>,
    desired_count: usize,
}

impl std::fmt::Debug for VnfMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnfMgr")
            .field("desired_count", &self.desired_count)
            .finish_non_exhaustive()
    }
}

impl VnfMgr {
    /// Loads the dictionary and desired rules and wires up the stack.
    ///
    /// Dictionary parse failures and hard validation errors are fatal;
    /// validation warnings are logged and do not block startup.
    pub fn new(config: VnfMgrConfig) -> anyhow::Result<Self> {
        let dictionary = Arc::new(load_dictionary(&config.dictionary_path)?);
        let desired = match &config.rules_path {
            Some(path) => load_desired_rules(path)?,
            None => Vec::new(),
        };
        info!(
            vendor = dictionary.vendor.as_deref().unwrap_or("<unset>"),
            product = dictionary.product.as_deref().unwrap_or("<unset>"),
            services = dictionary.services.len(),
            desired_rules = desired.len(),
            "dictionary loaded"
        );

        let audit = Arc::new(MemoryAuditSink::new());
        let broker_config = BrokerConfig {
            base_url: config.broker_url.clone(),
            connect_timeout: config.timeout,
            read_timeout: config.timeout,
            max_retries: config.max_retries,
            auth: match &config.auth_token {
                Some(token) => AuthCredentials::Bearer {
                    token: token.clone(),
                },
                None => AuthCredentials::None,
            },
            ..BrokerConfig::default()
        };
        let broker = Arc::new(
            BrokerClient::new(broker_config, audit.clone())?
                .with_appliance(config.appliance_id.clone()),
        );

        let operations = Arc::new(MemoryOperationStore::new());
        let runs = Arc::new(MemoryReconciliationStore::new());
        let dispatcher = Arc::new(Dispatcher::new(
            dictionary.clone(),
            broker.clone(),
            operations.clone(),
        ));

        let desired_count = desired.len();
        let reconciler = Reconciler::new(
            dictionary,
            broker.clone(),
            dispatcher,
            operations,
            runs,
            Arc::new(StaticDesiredState::new(desired)),
            ReconcilePolicy {
                auto_remove_extra: config.auto_remove,
            },
            config.appliance_id.clone(),
        );

        Ok(Self {
            config,
            broker,
            reconciler,
            audit,
            desired_count,
        })
    }

    /// Probes the broker's health endpoint.
    pub async fn probe_broker(&self) -> anyhow::Result<ConnectivityResult> {
        let result = self.broker.test_connectivity().await?;
        if result.reachable {
            info!(latency_ms = result.latency_ms, "broker reachable");
        } else {
            warn!(latency_ms = result.latency_ms, "broker unreachable");
        }
        Ok(result)
    }

    /// Runs one reconciliation pass for the configured network.
    pub async fn run_once(&self) -> anyhow::Result<ReconciliationRun> {
        let run = self
            .reconciler
            .reconcile(&self.config.network_id, self.config.dry_run)
            .await?;

        for action in &run.actions {
            info!(
                service = %action.service,
                action = ?action.action_type,
                rule_id = %action.rule_id,
                "{}",
                action.description
            );
        }
        info!(
            broker_attempts = self.audit.len(),
            failed_attempts = self.audit.failed().len(),
            "audit trail size"
        );
        Ok(run)
    }

    /// Number of desired rules loaded at startup.
    pub fn desired_count(&self) -> usize {
        self.desired_count
    }
}

fn load_dictionary(path: &PathBuf) -> anyhow::Result<VendorDictionary> {
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("failed to read dictionary {}", path.display()))?;

    let dictionary = DictionaryParser::default()
        .parse(&yaml)
        .with_context(|| format!("failed to parse dictionary {}", path.display()))?;

    let result = validate(&dictionary);
    for warning in result.warnings() {
        warn!(warning = %warning, "dictionary warning");
    }
    if !result.is_valid() {
        bail!(
            "dictionary {} failed validation: {}",
            path.display(),
            result.errors().join("; ")
        );
    }
    Ok(dictionary)
}

fn load_desired_rules(path: &PathBuf) -> anyhow::Result<Vec<DesiredRule>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read rules file {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("failed to parse rules file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DICT: &str = r#"
vendor: acme
product: fw-9000
access:
  protocol: https
services:
  firewall:
    create:
      method: POST
      endpoint: /rules
      body: '{"src": "${sourceCidr}"}'
    delete:
      method: DELETE
      endpoint: /rules/${externalId}
    list:
      method: GET
      endpoint: /rules
      responseMapping:
        listPath: rules
        item:
          externalId: id
"#;

    const RULES: &str = r#"[
        {"rule_id": "r-1", "service": "firewall", "variables": {"sourceCidr": "10.0.0.0/24"}},
        {"rule_id": "r-2", "service": "firewall", "variables": {"sourceCidr": "10.1.0.0/24"}, "external_id": "fw-2"}
    ]"#;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn config(dictionary: &NamedTempFile, rules: Option<&NamedTempFile>) -> VnfMgrConfig {
        VnfMgrConfig {
            dictionary_path: dictionary.path().to_path_buf(),
            rules_path: rules.map(|f| f.path().to_path_buf()),
            broker_url: "http://127.0.0.1:18443".to_string(),
            auth_token: None,
            network_id: "net-1".to_string(),
            appliance_id: "appliance-1".to_string(),
            dry_run: true,
            auto_remove: false,
            max_retries: 1,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_startup_loads_dictionary_and_rules() {
        let dictionary = write_file(DICT);
        let rules = write_file(RULES);

        let mgr = VnfMgr::new(config(&dictionary, Some(&rules))).unwrap();
        assert_eq!(mgr.desired_count(), 2);
    }

    #[test]
    fn test_startup_rejects_invalid_dictionary() {
        // Missing access section is a hard validation error.
        let dictionary = write_file("services:\n  firewall:\n    list:\n      method: GET\n");
        let err = VnfMgr::new(config(&dictionary, None)).unwrap_err();
        assert!(err.to_string().contains("failed validation"));
    }

    #[test]
    fn test_startup_rejects_bad_rules_file() {
        let dictionary = write_file(DICT);
        let rules = write_file("not json");
        let err = VnfMgr::new(config(&dictionary, Some(&rules))).unwrap_err();
        assert!(err.to_string().contains("rules file"));
    }
}
