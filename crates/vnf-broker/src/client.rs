//! The broker client: request execution with retries, auth, and audit.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use vnf_dictionary::WireRequest;

use crate::audit::{AuditSink, BrokerAuditRecord};
use crate::auth::auth_header_value;
use crate::backoff::backoff_delay;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};

/// Correlation header, stable across the retries of one logical call.
const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Header carrying the logical operation name.
const OPERATION_HEADER: &str = "X-VNF-Operation";

/// Proxy endpoint for SSH/CLI command execution on the broker.
const CLI_PROXY_PATH: &str = "/vnfproxy";

/// Health endpoint used by connectivity testing.
const HEALTH_PATH: &str = "/health";

/// Raw response from one successful broker exchange.
#[derive(Debug, Clone)]
pub struct BrokerResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
    /// End-to-end latency of the final attempt in milliseconds.
    pub latency_ms: u64,
    /// Correlation id of the logical call.
    pub correlation_id: String,
}

impl BrokerResponse {
    /// Returns true for 2xx statuses.
    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityResult {
    /// Whether the broker answered the health check successfully.
    pub reachable: bool,
    /// Probe latency in milliseconds.
    pub latency_ms: u64,
}

/// Executes wire requests against a device broker.
///
/// The trait seam lets orchestration code run against a fake broker in
/// tests; [`BrokerClient`] is the production implementation.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Executes one logical call, retrying per the client's policy.
    async fn execute(&self, request: &WireRequest, operation: &str)
        -> BrokerResult<BrokerResponse>;
}

/// HTTP client for the VNF device broker.
///
/// Handles timeouts, retries with jittered exponential backoff, auth
/// injection, and correlation ids. Every attempt is recorded through the
/// injected [`AuditSink`].
pub struct BrokerClient {
    http: reqwest::Client,
    config: BrokerConfig,
    audit: Arc<dyn AuditSink>,
    appliance: Option<String>,
}

impl BrokerClient {
    /// Creates a client from injected configuration and audit sink.
    pub fn new(config: BrokerConfig, audit: Arc<dyn AuditSink>) -> BrokerResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| BrokerError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            audit,
            appliance: None,
        })
    }

    /// Labels audit records with the target appliance.
    pub fn with_appliance(mut self, appliance: impl Into<String>) -> Self {
        self.appliance = Some(appliance.into());
        self
    }

    /// Probes the broker's health endpoint.
    ///
    /// An unreachable broker is a `reachable: false` result, not an error;
    /// only configuration problems raise.
    pub async fn test_connectivity(&self) -> BrokerResult<ConnectivityResult> {
        let url = self.compose_url(HEALTH_PATH)?;
        let correlation_id = Uuid::new_v4().to_string();
        let auth = auth_header_value(&self.config.auth, &url, "health_check")?;

        let mut request = self
            .http
            .get(&url)
            .header(CORRELATION_HEADER, correlation_id.as_str())
            .header(OPERATION_HEADER, "health_check")
            .header("Accept", "application/json");
        if let Some(auth) = &auth {
            request = request.header("Authorization", auth.as_str());
        }

        let requested_at = Utc::now();
        let start = Instant::now();
        let outcome = request.send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (reachable, status, error) = match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                ((200..300).contains(&status), Some(status), None)
            }
            Err(e) => (false, None, Some(e.to_string())),
        };

        self.audit.record(BrokerAuditRecord {
            appliance: self.appliance.clone(),
            operation: "health_check".to_string(),
            method: "GET".to_string(),
            endpoint: HEALTH_PATH.to_string(),
            correlation_id,
            attempt: 1,
            requested_at,
            responded_at: status.map(|_| Utc::now()),
            status_code: status,
            success: reachable,
            duration_ms: latency_ms,
            error,
        });

        Ok(ConnectivityResult {
            reachable,
            latency_ms,
        })
    }

    fn compose_url(&self, path: &str) -> BrokerResult<String> {
        let base = self.config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(BrokerError::config("broker base URL not configured"));
        }
        if path.starts_with('/') {
            Ok(format!("{base}{path}"))
        } else {
            Ok(format!("{base}/{path}"))
        }
    }

    /// Maps a wire request onto the HTTP call actually sent: CLI requests
    /// travel as a proxy envelope, HTTP requests map directly.
    fn wire_parts(&self, request: &WireRequest) -> BrokerResult<(reqwest::Method, String, Option<String>)> {
        if request.is_cli() {
            let envelope = json!({
                "protocol": "SSH",
                "command": request.endpoint,
            });
            let url = self.compose_url(CLI_PROXY_PATH)?;
            Ok((reqwest::Method::POST, url, Some(envelope.to_string())))
        } else {
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|_| BrokerError::config(format!("invalid method '{}'", request.method)))?;
            let url = self.compose_url(&request.endpoint)?;
            Ok((method, url, request.body.clone()))
        }
    }

    fn record_attempt(
        &self,
        request: &WireRequest,
        operation: &str,
        correlation_id: &str,
        attempt: u32,
        requested_at: chrono::DateTime<Utc>,
        status: Option<u16>,
        duration_ms: u64,
        error: Option<String>,
    ) {
        self.audit.record(BrokerAuditRecord {
            appliance: self.appliance.clone(),
            operation: operation.to_string(),
            method: request.method.clone(),
            endpoint: request.endpoint.clone(),
            correlation_id: correlation_id.to_string(),
            attempt,
            requested_at,
            responded_at: status.map(|_| Utc::now()),
            status_code: status,
            success: status.is_some_and(|s| (200..300).contains(&s)),
            duration_ms,
            error,
        });
    }
}

#[async_trait]
impl Broker for BrokerClient {
    async fn execute(
        &self,
        request: &WireRequest,
        operation: &str,
    ) -> BrokerResult<BrokerResponse> {
        let (method, url, body) = self.wire_parts(request)?;
        let correlation_id = Uuid::new_v4().to_string();
        let auth = auth_header_value(&self.config.auth, &url, operation)?;

        let mut attempt: u32 = 1;
        loop {
            let mut http_request = self
                .http
                .request(method.clone(), &url)
                .header(CORRELATION_HEADER, correlation_id.as_str())
                .header(OPERATION_HEADER, operation)
                .header("Accept", "application/json");
            if let Some(auth) = &auth {
                http_request = http_request.header("Authorization", auth.as_str());
            }
            for (name, value) in &request.headers {
                http_request = http_request.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &body {
                http_request = http_request
                    .header("Content-Type", "application/json")
                    .body(body.clone());
            }

            debug!(
                method = %method,
                url = %url,
                attempt,
                correlation_id = %correlation_id,
                "sending broker request"
            );

            let requested_at = Utc::now();
            let start = Instant::now();
            let outcome = async {
                let response = http_request.send().await?;
                let status = response.status().as_u16();
                let body = response.text().await?;
                Ok::<_, reqwest::Error>((status, body))
            }
            .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Err(source) => {
                    warn!(
                        attempt,
                        correlation_id = %correlation_id,
                        error = %source,
                        "broker transport error"
                    );
                    self.record_attempt(
                        request,
                        operation,
                        &correlation_id,
                        attempt,
                        requested_at,
                        None,
                        duration_ms,
                        Some(source.to_string()),
                    );

                    if attempt > self.config.max_retries {
                        return Err(BrokerError::Transport {
                            attempts: attempt,
                            source,
                        });
                    }
                }
                Ok((status, response_body)) => {
                    self.record_attempt(
                        request,
                        operation,
                        &correlation_id,
                        attempt,
                        requested_at,
                        Some(status),
                        duration_ms,
                        None,
                    );

                    if (200..300).contains(&status) {
                        debug!(
                            status,
                            attempt,
                            correlation_id = %correlation_id,
                            "broker call succeeded"
                        );
                        return Ok(BrokerResponse {
                            status,
                            body: response_body,
                            latency_ms: duration_ms,
                            correlation_id,
                        });
                    }

                    let retryable = status >= 500 || status == 429;
                    if !retryable || attempt > self.config.max_retries {
                        warn!(
                            status,
                            attempt,
                            correlation_id = %correlation_id,
                            "broker call failed"
                        );
                        return Err(BrokerError::Http {
                            status,
                            body: response_body,
                            attempts: attempt,
                        });
                    }

                    warn!(
                        status,
                        attempt,
                        correlation_id = %correlation_id,
                        "broker call failed, retrying"
                    );
                }
            }

            let delay = backoff_delay(
                attempt,
                self.config.initial_backoff,
                self.config.max_backoff,
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;

    fn client(base_url: &str) -> BrokerClient {
        BrokerClient::new(
            BrokerConfig::new(base_url),
            Arc::new(MemoryAuditSink::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_compose_url() {
        let c = client("http://broker:8443/");
        assert_eq!(c.compose_url("/health").unwrap(), "http://broker:8443/health");
        assert_eq!(c.compose_url("rules").unwrap(), "http://broker:8443/rules");
    }

    #[test]
    fn test_missing_base_url_is_config_error() {
        let c = client("");
        assert!(matches!(
            c.compose_url("/health").unwrap_err(),
            BrokerError::Config { .. }
        ));
    }

    #[test]
    fn test_cli_requests_wrap_in_proxy_envelope() {
        let c = client("http://broker:8443");
        let request = WireRequest {
            method: "SSH".to_string(),
            endpoint: "set nat rule 1".to_string(),
            body: None,
            headers: Vec::new(),
        };

        let (method, url, body) = c.wire_parts(&request).unwrap();
        assert_eq!(method, reqwest::Method::POST);
        assert_eq!(url, "http://broker:8443/vnfproxy");
        let envelope: serde_json::Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(envelope["protocol"], "SSH");
        assert_eq!(envelope["command"], "set nat rule 1");
    }
}
