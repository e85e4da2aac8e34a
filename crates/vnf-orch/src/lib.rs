//! Orchestration core for VNF rule management.
//!
//! This crate ties the dictionary and broker layers into the behavior the
//! orchestrator consumes:
//!
//! - [`operation`]: the [`Operation`] record and its monotonic state machine
//! - [`intent`]: rule intents and their versioned content hashes
//! - [`store`]: append-only store traits with in-memory implementations
//! - [`dispatch`]: idempotent intent dispatch ([`Dispatcher`])
//! - [`reconcile`]: desired-vs-actual drift detection and repair
//!   ([`Reconciler`])
//! - [`registry`]: dictionary storage keyed by template or network
//!
//! # Concurrency contract
//!
//! Dispatch performs a check-then-act sequence against the operation store;
//! it does not serialize concurrent submissions for the same rule id.
//! Callers must guarantee at most one in-flight submission per rule id.
//! Reconciliation runs for different networks are independent and may run
//! fully in parallel.

pub mod dispatch;
pub mod error;
pub mod intent;
pub mod operation;
pub mod reconcile;
pub mod registry;
pub mod store;

pub use dispatch::Dispatcher;
pub use error::{OrchError, OrchResult};
pub use intent::{content_hash, RuleIntent};
pub use operation::{Operation, OperationState, OperationType};
pub use reconcile::{
    ActionType, DesiredRule, DesiredStateProvider, ReconcilePolicy, ReconciliationAction,
    ReconciliationRun, Reconciler, RunStatus, StaticDesiredState,
};
pub use registry::{DictionaryRegistry, DictionaryScope};
pub use store::{
    MemoryOperationStore, MemoryReconciliationStore, OperationStore, ReconciliationStore,
};
