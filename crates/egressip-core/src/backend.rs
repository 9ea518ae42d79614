//! Capability traits for both sides of an egress IP

use crate::context::Context;
use crate::error::Result;
use crate::model::Assignment;
use async_trait::async_trait;
use std::net::IpAddr;

/// Cloud side: owns the address on the network interface of a host.
///
/// Implementations resolve the host name to the host's network interface
/// themselves. All calls may block on the cloud API.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Returns the backend name (e.g., "aws", "bare-metal")
    fn name(&self) -> &str;

    /// Allocate an unused address on the host's interface.
    async fn add_random_ip(&self, ctx: &Context, host: &str) -> Result<IpAddr>;

    /// Attach `ip` to the host.
    ///
    /// Fails with `Conflict` if the host already carries the address,
    /// `CapacityExceeded` if the interface is full and `NotFound` if the host
    /// or its interface can not be resolved.
    async fn add_specified_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()>;

    /// `NotAssigned` if the address is not on the host's interface.
    async fn check_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()>;

    /// Unassign from `old_host`, assign to `new_host` with reassignment
    /// allowed. `NotAssigned` if the address is not on `old_host`.
    async fn move_ip(&self, ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str)
    -> Result<()>;

    /// Idempotent: a missing interface or a missing address is success.
    async fn remove_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()>;
}

/// Cluster side: decides which host routes an address.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Returns the backend name (e.g., "ocp-static", "ocp-dynamic")
    fn name(&self) -> &str;

    /// Pick an eligible host and an unused address of the failure domain.
    async fn find_host_for_new_ip(&self, ctx: &Context, failure_domain: &str)
    -> Result<Assignment>;

    async fn add_specified_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()>;

    async fn check_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()>;

    async fn move_ip(&self, ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str)
    -> Result<()>;

    async fn remove_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()>;

    /// Assign the failure domain ranges to a host. Only backends owning a
    /// whole range per host do anything here.
    async fn assign_cidr(&self, ctx: &Context, host: &str) -> Result<()>;
}
