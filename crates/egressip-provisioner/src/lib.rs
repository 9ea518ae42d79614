//! Egress IP provisioning
//!
//! An egress IP lives in two places at once: the cloud owns the address on
//! a network interface and the cluster routes traffic through it on one
//! host. Neither side can update both atomically, so the [`Coordinator`]
//! runs every change as a two step saga:
//!
//! ```text
//! cloud step ──ok──> cluster step ──ok──> done
//!     │                   │
//!    err                 err ──> undo cloud step ──ok──> cluster error
//!     │                                 │
//!     v                                err
//! cloud error                           v
//!                               StateDivergence
//! ```
//!
//! Failures that need an operator are tracked per namespace by the
//! [`AlarmStore`], which also feeds the `egress_ip_handling_failures` gauge.

pub mod alarm;
pub mod bare_metal;
pub mod coordinator;
pub mod status;
pub mod wiring;

pub use alarm::{AlarmStore, FailedEgressIp};
pub use bare_metal::BareMetalCloudBackend;
pub use coordinator::Coordinator;
pub use status::StatusReporter;
pub use wiring::{assemble, build_coordinator};
