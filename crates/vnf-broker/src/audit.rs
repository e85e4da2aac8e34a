//! Append-only audit trail for broker calls.
//!
//! One record is appended per call attempt, including retries, so the trail
//! reconstructs exactly what was sent to a device and when.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One broker call attempt.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerAuditRecord {
    /// Appliance the call targeted, when known.
    pub appliance: Option<String>,
    /// Logical operation name, e.g. `firewall.create`.
    pub operation: String,
    /// Wire method.
    pub method: String,
    /// Endpoint path or command.
    pub endpoint: String,
    /// Correlation id, stable across the retries of one logical call.
    pub correlation_id: String,
    /// Attempt number within the logical call, 1-based.
    pub attempt: u32,
    /// When the request was sent.
    pub requested_at: DateTime<Utc>,
    /// When the response arrived, if one did.
    pub responded_at: Option<DateTime<Utc>>,
    /// HTTP status, if a response arrived.
    pub status_code: Option<u16>,
    /// Whether this attempt succeeded.
    pub success: bool,
    /// Attempt duration in milliseconds.
    pub duration_ms: u64,
    /// Transport or device error detail, if any.
    pub error: Option<String>,
}

/// Destination for audit records.
///
/// Implementations must be append-only; the client never reads back or
/// amends what it recorded.
pub trait AuditSink: Send + Sync {
    /// Appends one attempt record.
    fn record(&self, record: BrokerAuditRecord);
}

/// In-memory audit sink.
///
/// The seam a host's persistent audit table plugs into; this implementation
/// backs tests and the standalone daemon.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<BrokerAuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all records in append order.
    pub fn records(&self) -> Vec<BrokerAuditRecord> {
        self.records.lock().expect("audit lock poisoned").clone()
    }

    /// Returns the number of recorded attempts.
    pub fn len(&self) -> usize {
        self.records.lock().expect("audit lock poisoned").len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the failed attempts in append order.
    pub fn failed(&self) -> Vec<BrokerAuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| !r.success)
            .collect()
    }

    /// Returns the attempts for one logical operation name.
    pub fn by_operation(&self, operation: &str) -> Vec<BrokerAuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.operation == operation)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: BrokerAuditRecord) {
        self.records.lock().expect("audit lock poisoned").push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(operation: &str, success: bool) -> BrokerAuditRecord {
        BrokerAuditRecord {
            appliance: Some("appliance-1".to_string()),
            operation: operation.to_string(),
            method: "POST".to_string(),
            endpoint: "/rules".to_string(),
            correlation_id: "corr-1".to_string(),
            attempt: 1,
            requested_at: Utc::now(),
            responded_at: Some(Utc::now()),
            status_code: Some(if success { 200 } else { 500 }),
            success,
            duration_ms: 12,
            error: None,
        }
    }

    #[test]
    fn test_append_and_query() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());

        sink.record(sample("firewall.create", true));
        sink.record(sample("firewall.create", false));
        sink.record(sample("nat.delete", true));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.by_operation("firewall.create").len(), 2);
        assert_eq!(sink.failed().len(), 1);
        assert_eq!(sink.failed()[0].status_code, Some(500));
    }
}
