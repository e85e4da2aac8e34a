//! Broker client for VNF device communication.
//!
//! The broker is the network-addressable endpoint on or near a VNF appliance
//! that receives translated wire requests. This crate provides:
//!
//! - [`client`]: the [`BrokerClient`] and the [`Broker`] trait it implements,
//!   with retry/backoff, auth injection, and stable correlation ids
//! - [`config`]: injected [`BrokerConfig`] (no process-wide globals)
//! - [`auth`]: header construction for basic, bearer, and minted JWT auth
//! - [`backoff`]: jittered exponential backoff arithmetic
//! - [`audit`]: the append-only [`BrokerAuditRecord`] trail, one record per
//!   call attempt
//! - [`response`]: device response interpretation (success detection,
//!   external id extraction, list parsing)
//!
//! Every call attempt, including retries, lands in the audit trail through
//! the injected [`AuditSink`]. Correlation ids are fixed across the retries
//! of one logical call so the trail can be grouped end to end.

pub mod audit;
pub mod auth;
pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod response;

pub use audit::{AuditSink, BrokerAuditRecord, MemoryAuditSink};
pub use backoff::backoff_delay;
pub use client::{Broker, BrokerClient, BrokerResponse, ConnectivityResult};
pub use config::{AuthCredentials, BrokerConfig};
pub use error::{BrokerError, BrokerResult};
pub use response::{
    extract_error_message, extract_external_id, is_success, parse_body, parse_list_response,
    DeviceRule,
};
