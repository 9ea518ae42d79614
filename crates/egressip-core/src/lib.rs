//! Egress IP core contracts
//!
//! An egress IP has to exist in two independently managed places at once:
//! the cloud, which owns the address on a host's network interface, and the
//! cluster network, which routes workload traffic through that address on
//! the same host. This crate defines the capability traits for both sides,
//! the data model they exchange and the error taxonomy every layer speaks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              control loop / egressip CLI         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              egressip-provisioner                │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Coordinator (step, step, compensate)    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  AlarmStore  │  │StatusReporter│            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ CloudBackend  │ │ClusterBackend │
//! │ (aws, bare)   │ │(static, cidr) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod backend;
pub mod cidr;
pub mod context;
pub mod error;
pub mod model;

// Re-exports
pub use backend::{CloudBackend, ClusterBackend};
pub use cidr::Cidr;
pub use context::Context;
pub use error::{EgressIpError, ErrorKind, Result};
pub use model::{Assignment, EgressIpStatus, FailureDomain, NodeSelector, Phase};
