//! VNF adapter daemon library.
//!
//! `vnfmgrd` composes the dictionary, broker, and orchestration crates into
//! a standalone process: it loads and validates a vendor dictionary, probes
//! broker connectivity, and runs periodic drift reconciliation for one
//! network.

pub mod vnf_mgr;

pub use vnf_mgr::{VnfMgr, VnfMgrConfig};
