//! Store traits and in-memory implementations.
//!
//! The traits are the seam a host's persistence layer plugs into. The
//! in-memory implementations back tests and the standalone daemon; both are
//! append-oriented and internally synchronized.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::OrchResult;
use crate::operation::{Operation, OperationState, OperationType};
use crate::reconcile::ReconciliationRun;

/// Storage for [`Operation`] records.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Appends a new operation.
    async fn insert(&self, operation: Operation) -> OrchResult<()>;

    /// Replaces the stored record with the same id.
    async fn update(&self, operation: &Operation) -> OrchResult<()>;

    /// Returns the most recent operation for a rule id and type.
    async fn find_by_rule_id(
        &self,
        rule_id: &str,
        operation_type: OperationType,
    ) -> OrchResult<Option<Operation>>;

    /// Returns the most recent operation with this content hash.
    async fn find_by_content_hash(&self, content_hash: &str) -> OrchResult<Option<Operation>>;

    /// Returns all operations for an appliance, oldest first.
    async fn list_for_instance(&self, vnf_instance_id: &str) -> OrchResult<Vec<Operation>>;

    /// Returns the failed operations for an appliance, oldest first.
    async fn list_failed(&self, vnf_instance_id: &str) -> OrchResult<Vec<Operation>>;
}

/// In-memory [`OperationStore`].
#[derive(Debug, Default)]
pub struct MemoryOperationStore {
    operations: RwLock<Vec<Operation>>,
}

impl MemoryOperationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored operations.
    pub async fn len(&self) -> usize {
        self.operations.read().await.len()
    }

    /// Returns true when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    async fn insert(&self, operation: Operation) -> OrchResult<()> {
        self.operations.write().await.push(operation);
        Ok(())
    }

    async fn update(&self, operation: &Operation) -> OrchResult<()> {
        let mut operations = self.operations.write().await;
        if let Some(existing) = operations.iter_mut().find(|o| o.id == operation.id) {
            *existing = operation.clone();
        }
        Ok(())
    }

    async fn find_by_rule_id(
        &self,
        rule_id: &str,
        operation_type: OperationType,
    ) -> OrchResult<Option<Operation>> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .rev()
            .find(|o| o.rule_id == rule_id && o.operation_type == operation_type)
            .cloned())
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> OrchResult<Option<Operation>> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .rev()
            .find(|o| o.content_hash == content_hash)
            .cloned())
    }

    async fn list_for_instance(&self, vnf_instance_id: &str) -> OrchResult<Vec<Operation>> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .filter(|o| o.vnf_instance_id == vnf_instance_id)
            .cloned()
            .collect())
    }

    async fn list_failed(&self, vnf_instance_id: &str) -> OrchResult<Vec<Operation>> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .filter(|o| {
                o.vnf_instance_id == vnf_instance_id && o.state == OperationState::Failed
            })
            .cloned()
            .collect())
    }
}

/// Storage for [`ReconciliationRun`] records.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Appends a new run.
    async fn insert(&self, run: ReconciliationRun) -> OrchResult<()>;

    /// Replaces the stored run with the same id.
    async fn update(&self, run: &ReconciliationRun) -> OrchResult<()>;

    /// Returns the most recent run for a network.
    async fn latest_for_network(&self, network_id: &str) -> OrchResult<Option<ReconciliationRun>>;

    /// Returns all runs that detected drift, oldest first.
    async fn list_with_drift(&self) -> OrchResult<Vec<ReconciliationRun>>;
}

/// In-memory [`ReconciliationStore`].
#[derive(Debug, Default)]
pub struct MemoryReconciliationStore {
    runs: RwLock<Vec<ReconciliationRun>>,
}

impl MemoryReconciliationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationStore for MemoryReconciliationStore {
    async fn insert(&self, run: ReconciliationRun) -> OrchResult<()> {
        self.runs.write().await.push(run);
        Ok(())
    }

    async fn update(&self, run: &ReconciliationRun) -> OrchResult<()> {
        let mut runs = self.runs.write().await;
        if let Some(existing) = runs.iter_mut().find(|r| r.id == run.id) {
            *existing = run.clone();
        }
        Ok(())
    }

    async fn latest_for_network(&self, network_id: &str) -> OrchResult<Option<ReconciliationRun>> {
        Ok(self
            .runs
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.network_id == network_id)
            .cloned())
    }

    async fn list_with_drift(&self) -> OrchResult<Vec<ReconciliationRun>> {
        Ok(self
            .runs
            .read()
            .await
            .iter()
            .filter(|r| r.drift_detected)
            .cloned()
            .collect())
    }
}
