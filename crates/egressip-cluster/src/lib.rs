//! Cluster network backends for egress IPs
//!
//! The cluster routes egress traffic through an address on exactly one host.
//! That routing is recorded per host in a [`HostSubnet`] (the OpenShift SDN
//! resource of the same name). Two [`ClusterBackend`] variants are provided:
//!
//! - [`StaticClusterBackend`]: individual addresses are written onto the host
//!   subnets and new addresses are drawn from the failure domain's CIDR.
//! - [`DynamicCidrClusterBackend`]: the whole failure domain range is put on
//!   every matching host and the cluster picks the host by itself.
//!
//! Host subnets are read and written through a [`HostSubnetStore`].
//!
//! [`ClusterBackend`]: egressip_core::ClusterBackend

pub mod dynamic;
pub mod static_pool;
pub mod store;
pub mod subnet;

pub use dynamic::DynamicCidrClusterBackend;
pub use static_pool::StaticClusterBackend;
pub use store::{FileHostSubnetStore, HostSubnetStore, MemoryHostSubnetStore};
pub use subnet::HostSubnet;
